use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 软件目录 (Pivotal Network API) 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// 下载 API 与远程 wget 共用的令牌，不会被序列化
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub api_key: SecretString,
    pub request_timeout_seconds: u64,
    pub accept_eula: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://network.pivotal.io".to_string(),
            api_key: SecretString::new(String::new().into_boxed_str()),
            request_timeout_seconds: 60,
            accept_eula: true,
        }
    }
}

impl CatalogConfig {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.expose_secret().trim().is_empty()
    }
}

pub(crate) fn deserialize_secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(SecretString::new(raw.into_boxed_str()))
}

impl ConfigValidator for CatalogConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_url(&self.base_url, "catalog.base_url")?;
        ValidationUtils::validate_timeout_seconds(
            self.request_timeout_seconds,
            "catalog.request_timeout_seconds",
        )?;
        Ok(())
    }
}
