use std::sync::Arc;

use provisioner_domain::{CatalogClient, ProvisionError, ProvisionResult, Release, ReleaseCatalogEntry};
use tracing::{debug, info, warn};

/// 从软件目录中找出产品的最新发布
pub struct VersionResolver {
    catalog: Arc<dyn CatalogClient>,
}

impl VersionResolver {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }

    /// slug 包含 `product` 的产品，多个匹配时取最后一个
    pub async fn find_product(&self, product: &str) -> ProvisionResult<ReleaseCatalogEntry> {
        let products = self.catalog.list_products().await?;
        debug!("软件目录中共有 {} 个产品", products.len());

        products
            .into_iter()
            .filter(|entry| entry.slug.contains(product))
            .last()
            .ok_or_else(|| ProvisionError::product_not_found(product))
    }

    /// 解析最新发布
    ///
    /// 版本比较键见 [`Release::version_key`]，不假定发布列表有序。键相等时后出现的胜出。
    pub async fn resolve_latest_release(
        &self,
        product: &str,
    ) -> ProvisionResult<(ReleaseCatalogEntry, Release)> {
        let entry = self.find_product(product).await?;
        let releases = self.catalog.list_releases(&entry).await?;

        let latest = latest_release(releases).ok_or_else(|| {
            ProvisionError::catalog_unavailable(format!("产品 {} 没有可比较的发布版本", entry.slug))
        })?;

        info!("{} 最新发布: {} (id={})", entry.slug, latest.version, latest.id);
        Ok((entry, latest))
    }
}

/// 线性扫描，按版本键取最大值
pub fn latest_release(releases: Vec<Release>) -> Option<Release> {
    let mut latest: Option<(u64, Release)> = None;

    for release in releases {
        let Some(key) = release.version_key() else {
            warn!("跳过无法比较的版本: {}", release.version);
            continue;
        };
        match latest {
            Some((max, _)) if key < max => {}
            _ => latest = Some((key, release)),
        }
    }

    latest.map(|(_, release)| release)
}
