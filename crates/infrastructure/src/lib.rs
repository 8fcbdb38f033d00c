pub mod catalog_client;
pub mod ssh;

pub use catalog_client::HttpCatalogClient;
pub use ssh::{SshConnector, SshSession};
