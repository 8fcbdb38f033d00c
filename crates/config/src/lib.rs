pub mod models;
pub mod validation;

pub use models::{
    AppConfig, CatalogConfig, DistributionConfig, LogFormat, ObservabilityConfig, SelectionConfig,
    SshConfig,
};
pub use validation::{ConfigValidator, ValidationUtils};

/// Configuration error type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration error enumeration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File error: {0}")]
    File(String),
}

impl From<ConfigError> for provisioner_domain::ProvisionError {
    fn from(err: ConfigError) -> Self {
        provisioner_domain::ProvisionError::Configuration(err.to_string())
    }
}
