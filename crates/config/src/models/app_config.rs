use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    catalog::CatalogConfig,
    distribution::{DistributionConfig, SelectionConfig},
    logging::ObservabilityConfig,
    ssh::SshConfig,
};
use crate::validation::{ConfigValidator, ValidationUtils};

/// 旧版工具使用的环境变量名与对应配置键
const LEGACY_ENV_KEYS: [(&str, &str); 5] = [
    ("PIVNET_APIKEY", "catalog.api_key"),
    ("SSH_USERNAME", "ssh.username"),
    ("CONFIGS_PATH", "ssh.key_base_path"),
    ("SSH_KEY", "ssh.key_file"),
    ("MADLIB_VERSION", "distribution.version_token"),
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub ssh: SshConfig,
    pub distribution: DistributionConfig,
    pub selection: SelectionConfig,
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 加载顺序：内置默认值 < 配置文件 < PROVISIONER_* 环境变量 < 旧版环境变量名
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/provisioner.toml",
                "provisioner.toml",
                "/etc/provisioner/config.toml",
            ];

            for path in &default_paths {
                if Path::new(path).exists() {
                    debug!("使用配置文件: {}", path);
                    builder = builder.add_source(File::new(path, FileFormat::Toml));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("PROVISIONER")
                .prefix_separator("_")
                .separator("__"),
        );

        for (env_name, key) in LEGACY_ENV_KEYS {
            if let Ok(value) = std::env::var(env_name) {
                debug!("使用旧版环境变量 {} 覆盖 {}", env_name, key);
                builder = builder
                    .set_override(key, value)
                    .with_context(|| format!("应用环境变量失败: {env_name}"))?;
            }
        }

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    /// 分发前检查凭据是否齐全，密钥文件必须存在且可访问
    pub fn check_credentials(&self) -> crate::ConfigResult<()> {
        if !self.catalog.has_api_key() {
            return Err(crate::ConfigError::Validation(
                "catalog.api_key cannot be empty (set PIVNET_APIKEY)".to_string(),
            ));
        }
        ValidationUtils::validate_not_empty(&self.ssh.username, "ssh.username")?;
        ValidationUtils::validate_not_empty(&self.ssh.key_file, "ssh.key_file")?;

        let key_path = self.ssh.key_path();
        if !key_path.is_file() {
            return Err(crate::ConfigError::File(format!(
                "无法访问SSH密钥文件: {}",
                key_path.display()
            )));
        }
        Ok(())
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.catalog.validate()?;
        self.ssh.validate()?;
        self.distribution.validate()?;
        self.selection.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}
