use async_trait::async_trait;
use provisioner_errors::ProvisionResult;
use serde::{Deserialize, Serialize};

use crate::entities::ClusterNode;

/// 远程命令的执行结果，stdout/stderr 均已读尽
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Opens remote command sessions to cluster nodes
#[async_trait]
pub trait RemoteConnector: Send + Sync {
    async fn connect(&self, node: &ClusterNode) -> ProvisionResult<Box<dyn RemoteSession>>;
}

/// An open command channel to one node
#[async_trait]
pub trait RemoteSession: Send {
    /// 执行一条命令，返回前读尽 stdout 和 stderr
    async fn exec(&mut self, command: &str) -> ProvisionResult<CommandOutput>;

    /// 关闭会话，必须可重复调用
    fn close(&mut self);
}
