use thiserror::Error;

/// 单个节点的失败记录
#[derive(Debug)]
pub struct NodeFailure {
    pub node_name: String,
    pub external_ip: String,
    pub error: ProvisionError,
}

impl std::fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}): {}", self.node_name, self.external_ip, self.error)
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("软件目录不可用: {0}")]
    CatalogUnavailable(String),
    #[error("未找到产品: {slug}")]
    ProductNotFound { slug: String },
    #[error("节点 {node} 连接重试耗尽 (尝试 {attempts} 次): {last_error}")]
    ConnectionExhausted {
        node: String,
        attempts: u32,
        last_error: String,
    },
    #[error("远程会话错误: {0}")]
    Session(String),
    #[error("节点 {node} 命令执行失败 [{command}], 退出码: {exit_code:?}, stderr: {stderr}")]
    CommandFailure {
        node: String,
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    #[error("{} 个节点分发失败: {}", .failures.len(), join_failures(.failures))]
    DistributionFailed { failures: Vec<NodeFailure> },
    #[error("配置错误: {0}")]
    Configuration(String),
    #[error("序列化错误: {0}")]
    Serialization(String),
    #[error("内部错误: {0}")]
    Internal(String),
}

pub type ProvisionResult<T> = Result<T, ProvisionError>;

fn join_failures(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ProvisionError {
    pub fn catalog_unavailable<S: Into<String>>(msg: S) -> Self {
        Self::CatalogUnavailable(msg.into())
    }
    pub fn product_not_found<S: Into<String>>(slug: S) -> Self {
        Self::ProductNotFound { slug: slug.into() }
    }
    pub fn session<S: Into<String>>(msg: S) -> Self {
        Self::Session(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn connection_exhausted<S: Into<String>>(node: S, attempts: u32, last_error: &ProvisionError) -> Self {
        Self::ConnectionExhausted {
            node: node.into(),
            attempts,
            last_error: last_error.to_string(),
        }
    }
    /// 只有瞬时的连接/传输错误才允许在会话层重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::Session(_))
    }
    /// 致命错误会使整个分发运行失败
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProvisionError::ConnectionExhausted { .. }
                | ProvisionError::DistributionFailed { .. }
                | ProvisionError::ProductNotFound { .. }
                | ProvisionError::Configuration(_)
                | ProvisionError::Internal(_)
        )
    }
    /// 分发失败时涉及的节点名
    pub fn failed_nodes(&self) -> Vec<&str> {
        match self {
            ProvisionError::DistributionFailed { failures } => {
                failures.iter().map(|f| f.node_name.as_str()).collect()
            }
            ProvisionError::ConnectionExhausted { node, .. }
            | ProvisionError::CommandFailure { node, .. } => vec![node.as_str()],
            _ => Vec::new(),
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(err: serde_json::Error) -> Self {
        ProvisionError::Serialization(err.to_string())
    }
}
