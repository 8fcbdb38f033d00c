//! 带重试预算的远程会话管理
//!
//! 每次尝试都会新建会话，会话在任何退出路径上都会被关闭。

use std::sync::Arc;

use async_trait::async_trait;
use provisioner_domain::{
    ClusterNode, ProvisionError, ProvisionResult, RemoteConnector, RemoteSession,
};
use tracing::{debug, error, info, warn};

use crate::retry::RetryBudget;

/// 在一个已打开的会话中执行的工作
#[async_trait]
pub trait SessionWork: Send + Sync {
    type Output: Send;

    async fn run(
        &self,
        node: &ClusterNode,
        session: &mut dyn RemoteSession,
    ) -> ProvisionResult<Self::Output>;
}

/// 离开作用域时关闭会话
struct SessionGuard {
    session: Box<dyn RemoteSession>,
}

impl SessionGuard {
    fn session(&mut self) -> &mut dyn RemoteSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

#[derive(Clone)]
pub struct SessionManager {
    connector: Arc<dyn RemoteConnector>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self { connector }
    }

    /// 打开会话并执行 `work`
    ///
    /// 连接失败和会话传输错误会在固定间隔后重试，共尝试 `budget.attempts` 次，
    /// 耗尽后返回 `ConnectionExhausted`。其他错误（如命令失败）直接返回。
    pub async fn with_session<W: SessionWork>(
        &self,
        node: &ClusterNode,
        budget: RetryBudget,
        work: &W,
    ) -> ProvisionResult<W::Output> {
        let mut last_error = None;

        for attempt in 1..=budget.attempts {
            info!(
                "{}: 连接 {} (第 {}/{} 次)",
                node.node_name, node.external_ip, attempt, budget.attempts
            );

            let result = match self.connector.connect(node).await {
                Ok(session) => {
                    let mut guard = SessionGuard { session };
                    work.run(node, guard.session()).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(output) => {
                    debug!("{}: 会话工作完成", node.node_name);
                    return Ok(output);
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "{}: 第 {}/{} 次尝试失败: {}",
                        node.node_name, attempt, budget.attempts, e
                    );
                    last_error = Some(e);
                    if attempt < budget.attempts {
                        tokio::time::sleep(budget.delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        let last_error =
            last_error.unwrap_or_else(|| ProvisionError::session("没有进行任何连接尝试"));
        error!(
            "{}: 连接重试耗尽，共尝试 {} 次",
            node.node_name, budget.attempts
        );
        Err(ProvisionError::connection_exhausted(
            node.node_name.clone(),
            budget.attempts,
            &last_error,
        ))
    }
}
