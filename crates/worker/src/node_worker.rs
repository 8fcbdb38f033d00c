use std::sync::Arc;

use provisioner_config::AppConfig;
use provisioner_domain::{
    ArtifactDescriptor, ClusterNode, CommandOutput, ProvisionResult, RemoteConnector,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::info;

use crate::commands::{fetch_command, CommandBatch, RemoteCommand};
use crate::retry::RetryBudget;
use crate::session_manager::SessionManager;

/// 节点工作者的运行参数
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub api_key: SecretString,
    pub staging_dir: String,
    pub fail_on_command_error: bool,
    pub distribution_budget: RetryBudget,
    pub preparation_budget: RetryBudget,
}

impl WorkerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            api_key: config.catalog.api_key.clone(),
            staging_dir: config.distribution.staging_dir.clone(),
            fail_on_command_error: config.distribution.fail_on_command_error,
            distribution_budget: RetryBudget::distribution(&config.distribution),
            preparation_budget: RetryBudget::preparation(&config.distribution),
        }
    }
}

/// 一个节点实际收到的制品
#[derive(Debug, Clone, Serialize)]
pub struct NodeDelivery {
    pub node_name: String,
    pub external_ip: String,
    pub role: String,
    pub artifacts: Vec<ArtifactDescriptor>,
    #[serde(skip)]
    pub outputs: Vec<CommandOutput>,
}

/// 在单个节点上下载制品或执行命令
#[derive(Clone)]
pub struct NodeWorker {
    sessions: SessionManager,
    settings: Arc<WorkerSettings>,
}

impl NodeWorker {
    pub fn new(connector: Arc<dyn RemoteConnector>, settings: WorkerSettings) -> Self {
        Self {
            sessions: SessionManager::new(connector),
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &WorkerSettings {
        &self.settings
    }

    /// 按节点角色过滤出该节点需要的制品，保持原有顺序
    pub fn artifacts_for(node: &ClusterNode, artifacts: &[ArtifactDescriptor]) -> Vec<ArtifactDescriptor> {
        artifacts
            .iter()
            .filter(|artifact| artifact.is_targeted_at(node))
            .cloned()
            .collect()
    }

    /// 在一个会话中依次下载该节点需要的全部制品
    pub async fn deliver(
        &self,
        node: &ClusterNode,
        artifacts: &[ArtifactDescriptor],
    ) -> ProvisionResult<NodeDelivery> {
        let selected = Self::artifacts_for(node, artifacts);
        info!(
            "{}({}): 角色 {}，需要下载 {} 个制品",
            node.node_name,
            node.external_ip,
            node.role,
            selected.len()
        );

        let api_key = self.settings.api_key.expose_secret();
        let commands = selected
            .iter()
            .map(|artifact| fetch_command(artifact, api_key, &self.settings.staging_dir))
            .collect();
        let batch = CommandBatch::new(commands, self.settings.fail_on_command_error);

        let outputs = self
            .sessions
            .with_session(node, self.settings.distribution_budget, &batch)
            .await?;

        info!("{}: 制品下载完成", node.node_name);
        Ok(NodeDelivery {
            node_name: node.node_name.clone(),
            external_ip: node.external_ip.clone(),
            role: node.role.clone(),
            artifacts: selected,
            outputs,
        })
    }

    /// 使用准备类重试预算在节点上依次执行命令
    pub async fn run_commands(
        &self,
        node: &ClusterNode,
        commands: &[String],
    ) -> ProvisionResult<Vec<CommandOutput>> {
        let batch = CommandBatch::new(
            commands.iter().map(RemoteCommand::plain).collect(),
            self.settings.fail_on_command_error,
        );

        self.sessions
            .with_session(node, self.settings.preparation_budget, &batch)
            .await
    }
}
