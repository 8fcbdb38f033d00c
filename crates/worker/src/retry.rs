use std::time::Duration;

use provisioner_config::DistributionConfig;

/// 单个节点的连接重试预算：总尝试次数（含首次）与固定间隔
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryBudget {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// 分发制品时使用：重试一次后放弃
    pub fn distribution(config: &DistributionConfig) -> Self {
        Self::new(
            config.distribution_attempts,
            Duration::from_secs(config.retry_delay_seconds),
        )
    }

    /// 节点准备类命令使用，预算更宽松
    pub fn preparation(config: &DistributionConfig) -> Self {
        Self::new(
            config.preparation_attempts,
            Duration::from_secs(config.retry_delay_seconds),
        )
    }
}
