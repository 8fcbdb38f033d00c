use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub username: String,
    /// 密钥所在目录 (原 CONFIGS_PATH)，与 key_file 直接拼接
    pub key_base_path: String,
    /// 密钥文件名 (原 SSH_KEY)
    pub key_file: String,
    pub port: u16,
    /// 单次连接尝试的超时
    pub connect_timeout_seconds: u64,
    /// 不配置时所有主机密钥都视为未知，仅告警后接受
    pub known_hosts_path: Option<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            key_base_path: String::new(),
            key_file: String::new(),
            port: 22,
            connect_timeout_seconds: 120,
            known_hosts_path: None,
        }
    }
}

impl SshConfig {
    /// 直接拼接目录与文件名，不插入分隔符，目录需以 `/` 结尾
    pub fn key_path(&self) -> PathBuf {
        PathBuf::from(format!("{}{}", self.key_base_path, self.key_file))
    }
}

impl ConfigValidator for SshConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_port(self.port)?;
        ValidationUtils::validate_timeout_seconds(
            self.connect_timeout_seconds,
            "ssh.connect_timeout_seconds",
        )?;
        Ok(())
    }
}
