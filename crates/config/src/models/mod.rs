pub mod app_config;
pub mod catalog;
pub mod distribution;
pub mod logging;
pub mod ssh;

pub use app_config::*;
pub use catalog::*;
pub use distribution::*;
pub use logging::*;
pub use ssh::*;
