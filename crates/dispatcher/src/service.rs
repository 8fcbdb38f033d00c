use std::collections::BTreeMap;
use std::sync::Arc;

use provisioner_config::AppConfig;
use provisioner_domain::{
    ArtifactDescriptor, CatalogClient, ClusterDescriptor, ProvisionResult, Release,
    ReleaseCatalogEntry, RemoteConnector, TargetRole,
};
use provisioner_worker::{NodeDelivery, NodeWorker, WorkerSettings};
use serde::Serialize;
use tracing::{info, warn};

use crate::classifier::ArtifactClassifier;
use crate::resolver::VersionResolver;
use crate::scheduler::DistributionScheduler;

/// 一次分发运行的结果，供后续安装步骤使用
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub product: ReleaseCatalogEntry,
    pub release: Release,
    pub artifacts: Vec<ArtifactDescriptor>,
    pub deliveries: Vec<NodeDelivery>,
}

impl DistributionReport {
    /// 按目标角色分组，组内保持分类顺序
    pub fn artifacts_by_role(&self) -> BTreeMap<TargetRole, Vec<ArtifactDescriptor>> {
        let mut grouped: BTreeMap<TargetRole, Vec<ArtifactDescriptor>> = BTreeMap::new();
        for artifact in &self.artifacts {
            grouped
                .entry(artifact.target_role)
                .or_default()
                .push(artifact.clone());
        }
        grouped
    }
}

/// 解析 -> 分类 -> 分发 的端到端运行
pub struct DistributionService {
    resolver: VersionResolver,
    catalog: Arc<dyn CatalogClient>,
    classifier: ArtifactClassifier,
    scheduler: DistributionScheduler,
    accept_eula: bool,
}

impl DistributionService {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        connector: Arc<dyn RemoteConnector>,
        config: &AppConfig,
    ) -> Self {
        let worker = NodeWorker::new(connector, WorkerSettings::from_config(config));
        Self {
            resolver: VersionResolver::new(Arc::clone(&catalog)),
            catalog,
            classifier: ArtifactClassifier::from_config(config),
            scheduler: DistributionScheduler::new(worker),
            accept_eula: config.catalog.accept_eula,
        }
    }

    pub fn resolver(&self) -> &VersionResolver {
        &self.resolver
    }

    pub fn classifier(&self) -> &ArtifactClassifier {
        &self.classifier
    }

    /// 只解析和分类，不接受 EULA。集群类型即产品 slug 子串
    pub async fn resolve_artifacts(
        &self,
        cluster: &ClusterDescriptor,
    ) -> ProvisionResult<(ReleaseCatalogEntry, Release, Vec<ArtifactDescriptor>)> {
        self.select_artifacts(cluster, false).await
    }

    async fn select_artifacts(
        &self,
        cluster: &ClusterDescriptor,
        accept_eula: bool,
    ) -> ProvisionResult<(ReleaseCatalogEntry, Release, Vec<ArtifactDescriptor>)> {
        let (product, release) = self
            .resolver
            .resolve_latest_release(&cluster.cluster_type)
            .await?;

        let groups = self.catalog.release_files(&product, &release).await?;
        if accept_eula {
            self.catalog.accept_eula(&product, &release).await?;
        }

        let artifacts = self.classifier.classify(&cluster.cluster_type, &groups);
        if artifacts.is_empty() {
            warn!(
                "{} {} 中没有需要分发的制品",
                product.slug, release.version
            );
        } else {
            info!("{} {}: 选出 {} 个制品", product.slug, release.version, artifacts.len());
        }

        Ok((product, release, artifacts))
    }

    pub async fn run(&self, cluster: &ClusterDescriptor) -> ProvisionResult<DistributionReport> {
        let (product, release, artifacts) =
            self.select_artifacts(cluster, self.accept_eula).await?;

        let shared = Arc::new(artifacts);
        let deliveries = self
            .scheduler
            .distribute(cluster, Arc::clone(&shared))
            .await?;

        Ok(DistributionReport {
            product,
            release,
            artifacts: shared.to_vec(),
            deliveries,
        })
    }

    /// 在角色匹配的节点上执行准备类命令，返回成功的节点数
    pub async fn run_commands(
        &self,
        cluster: &ClusterDescriptor,
        role: &str,
        commands: Vec<String>,
    ) -> ProvisionResult<usize> {
        self.scheduler
            .run_commands(cluster, role, Arc::new(commands))
            .await
    }
}
