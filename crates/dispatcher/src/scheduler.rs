use std::collections::HashMap;
use std::sync::Arc;

use provisioner_domain::{
    ArtifactDescriptor, ClusterDescriptor, ClusterNode, NodeFailure, ProvisionError,
    ProvisionResult,
};
use provisioner_worker::{NodeDelivery, NodeWorker};
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{error, info};

/// 每个节点一个并发任务，等待全部结束后汇总结果
pub struct DistributionScheduler {
    worker: NodeWorker,
}

impl DistributionScheduler {
    pub fn new(worker: NodeWorker) -> Self {
        Self { worker }
    }

    /// 把制品分发到集群所有节点
    ///
    /// 单个节点失败不会中断其他节点。全部结束后若有失败，返回 `DistributionFailed`，
    /// 是否终止进程由调用方决定。成功时按集群节点顺序返回。
    pub async fn distribute(
        &self,
        cluster: &ClusterDescriptor,
        artifacts: Arc<Vec<ArtifactDescriptor>>,
    ) -> ProvisionResult<Vec<NodeDelivery>> {
        info!(
            "开始向集群 {} 的 {} 个节点分发 {} 个制品",
            cluster.cluster_name,
            cluster.nodes.len(),
            artifacts.len()
        );

        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for (index, node) in cluster.nodes.iter().cloned().enumerate() {
            let worker = self.worker.clone();
            let artifacts = Arc::clone(&artifacts);
            let task_node = node.clone();
            let handle = tasks.spawn(async move {
                let result = worker.deliver(&task_node, &artifacts).await;
                (index, task_node, result)
            });
            spawned.insert(handle.id(), node);
        }

        let mut deliveries: Vec<(usize, NodeDelivery)> = Vec::with_capacity(cluster.nodes.len());
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(delivery))) => deliveries.push((index, delivery)),
                Ok((_, node, Err(e))) => {
                    error!("{}({}): 分发失败: {}", node.node_name, node.external_ip, e);
                    failures.push(failure(&node, e));
                }
                Err(e) => failures.push(task_failure(&spawned, e)),
            }
        }

        if !failures.is_empty() {
            return Err(ProvisionError::DistributionFailed { failures });
        }

        deliveries.sort_by_key(|(index, _)| *index);
        info!("集群 {} 分发完成", cluster.cluster_name);
        Ok(deliveries.into_iter().map(|(_, delivery)| delivery).collect())
    }

    /// 在角色包含 `role` 的每个节点上执行同一组命令
    pub async fn run_commands(
        &self,
        cluster: &ClusterDescriptor,
        role: &str,
        commands: Arc<Vec<String>>,
    ) -> ProvisionResult<usize> {
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for node in cluster.nodes_with_role(role).cloned() {
            let worker = self.worker.clone();
            let commands = Arc::clone(&commands);
            let task_node = node.clone();
            let handle = tasks.spawn(async move {
                let result = worker.run_commands(&task_node, &commands).await;
                (task_node, result)
            });
            spawned.insert(handle.id(), node);
        }

        let mut completed = 0;
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => completed += 1,
                Ok((node, Err(e))) => {
                    error!("{}({}): 命令执行失败: {}", node.node_name, node.external_ip, e);
                    failures.push(failure(&node, e));
                }
                Err(e) => failures.push(task_failure(&spawned, e)),
            }
        }

        if !failures.is_empty() {
            return Err(ProvisionError::DistributionFailed { failures });
        }
        Ok(completed)
    }
}

fn failure(node: &ClusterNode, error: ProvisionError) -> NodeFailure {
    NodeFailure {
        node_name: node.node_name.clone(),
        external_ip: node.external_ip.clone(),
        error,
    }
}

/// 任务 panic 或被取消时，按任务 id 找回对应节点
fn task_failure(spawned: &HashMap<Id, ClusterNode>, error: JoinError) -> NodeFailure {
    let internal = ProvisionError::Internal(format!("节点任务异常: {error}"));
    match spawned.get(&error.id()) {
        Some(node) => {
            error!("{}({}): 节点任务异常: {}", node.node_name, node.external_ip, error);
            failure(node, internal)
        }
        None => {
            error!("未知节点的任务异常: {}", error);
            NodeFailure {
                node_name: "<unknown>".to_string(),
                external_ip: String::new(),
                error: internal,
            }
        }
    }
}
