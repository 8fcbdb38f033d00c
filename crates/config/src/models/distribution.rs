use provisioner_domain::{builtin_rule_sets, RuleSet};
use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// 远程节点上的暂存目录
    pub staging_dir: String,
    pub retry_delay_seconds: u64,
    /// 分发时每个节点的连接尝试次数（含首次）
    pub distribution_attempts: u32,
    /// 节点准备类命令的连接尝试次数（含首次）
    pub preparation_attempts: u32,
    /// 非零退出码是否视为失败
    pub fail_on_command_error: bool,
    /// 部分规则要求文件名包含此版本标记 (原 MADLIB_VERSION)
    pub version_token: Option<String>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            staging_dir: "/tmp".to_string(),
            retry_delay_seconds: 3,
            distribution_attempts: 2,
            preparation_attempts: 11,
            fail_on_command_error: true,
            version_token: None,
        }
    }
}

impl ConfigValidator for DistributionConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_absolute_path(&self.staging_dir, "distribution.staging_dir")?;
        if self.retry_delay_seconds > 3600 {
            return Err(crate::ConfigError::Validation(
                "distribution.retry_delay_seconds must be less than or equal to 3600".to_string(),
            ));
        }
        ValidationUtils::validate_count(
            self.distribution_attempts,
            "distribution.distribution_attempts",
            100,
        )?;
        ValidationUtils::validate_count(
            self.preparation_attempts,
            "distribution.preparation_attempts",
            100,
        )?;
        if let Some(ref token) = self.version_token {
            ValidationUtils::validate_not_empty(token, "distribution.version_token")?;
        }
        Ok(())
    }
}

/// 各集群类型的制品选择规则
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default = "builtin_rule_sets")]
    pub rule_sets: Vec<RuleSet>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            rule_sets: builtin_rule_sets(),
        }
    }
}

impl ConfigValidator for SelectionConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        for rule_set in &self.rule_sets {
            ValidationUtils::validate_not_empty(&rule_set.cluster_type, "selection.cluster_type")?;
            for rule in &rule_set.rules {
                ValidationUtils::validate_not_empty(&rule.group, "selection.rules.group")?;
            }
        }
        Ok(())
    }
}
