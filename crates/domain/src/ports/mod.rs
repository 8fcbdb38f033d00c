pub mod catalog;
pub mod remote;

pub use catalog::CatalogClient;
pub use remote::{CommandOutput, RemoteConnector, RemoteSession};
