use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use provisioner_config::AppConfig;
use provisioner_dispatcher::{DistributionReport, DistributionService};
use provisioner_domain::{
    ArtifactDescriptor, CatalogClient, ClusterDescriptor, Release, ReleaseCatalogEntry,
    RemoteConnector,
};
use provisioner_infrastructure::{HttpCatalogClient, SshConnector};
use tracing::info;

/// 主应用程序
pub struct Application {
    config: AppConfig,
    service: DistributionService,
}

impl Application {
    /// 使用 HTTP 目录客户端和 SSH 连接器创建应用
    pub fn new(config: AppConfig) -> Result<Self> {
        let catalog = HttpCatalogClient::new(&config.catalog).context("创建软件目录客户端失败")?;
        let connector = SshConnector::new(&config.ssh);
        Ok(Self::with_clients(config, Arc::new(catalog), Arc::new(connector)))
    }

    pub fn with_clients(
        config: AppConfig,
        catalog: Arc<dyn CatalogClient>,
        connector: Arc<dyn RemoteConnector>,
    ) -> Self {
        let service = DistributionService::new(catalog, connector, &config);
        Self { config, service }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn resolve(&self, product: &str) -> Result<(ReleaseCatalogEntry, Release)> {
        let resolved = self.service.resolver().resolve_latest_release(product).await?;
        Ok(resolved)
    }

    /// 只解析和分类，不接受 EULA，也不连接节点
    pub async fn classify(&self, cluster: &ClusterDescriptor) -> Result<Vec<ArtifactDescriptor>> {
        if !self.config.catalog.has_api_key() {
            anyhow::bail!("缺少软件目录 API key (catalog.api_key / PIVNET_APIKEY)");
        }
        let (_, _, artifacts) = self.service.resolve_artifacts(cluster).await?;
        Ok(artifacts)
    }

    pub async fn distribute(&self, cluster: &ClusterDescriptor) -> Result<DistributionReport> {
        self.config.check_credentials()?;
        info!(
            "分发集群 {} ({})，共 {} 个节点",
            cluster.cluster_name,
            cluster.cluster_type,
            cluster.nodes.len()
        );
        let report = self.service.run(cluster).await?;
        Ok(report)
    }

    /// 在角色匹配的节点上执行命令，返回完成的节点数
    pub async fn exec(
        &self,
        cluster: &ClusterDescriptor,
        role: &str,
        commands: Vec<String>,
    ) -> Result<usize> {
        self.config.check_credentials()?;
        let completed = self.service.run_commands(cluster, role, commands).await?;
        Ok(completed)
    }
}

/// 读取集群描述 JSON 文件
pub fn load_cluster(path: &Path) -> Result<ClusterDescriptor> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("读取集群描述失败: {}", path.display()))?;
    let cluster = ClusterDescriptor::from_json(&content)
        .with_context(|| format!("解析集群描述失败: {}", path.display()))?;
    Ok(cluster)
}
