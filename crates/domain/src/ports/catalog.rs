use async_trait::async_trait;
use provisioner_errors::ProvisionResult;

use crate::entities::{FileGroup, Release, ReleaseCatalogEntry};

/// Interface for the vendor release catalog
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn list_products(&self) -> ProvisionResult<Vec<ReleaseCatalogEntry>>;
    async fn list_releases(&self, product: &ReleaseCatalogEntry) -> ProvisionResult<Vec<Release>>;
    async fn release_files(
        &self,
        product: &ReleaseCatalogEntry,
        release: &Release,
    ) -> ProvisionResult<Vec<FileGroup>>;
    async fn accept_eula(&self, product: &ReleaseCatalogEntry, release: &Release) -> ProvisionResult<()>;
}
