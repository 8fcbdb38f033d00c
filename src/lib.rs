pub mod app;

pub use app::{load_cluster, Application};
