//! Integration test helpers

use provisioner_config::AppConfig;
use secrecy::SecretString;

/// 测试用配置：重试不等待，带一个假的 API key
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.catalog.api_key = SecretString::new("test-token".to_string().into_boxed_str());
    config.ssh.username = "centos".to_string();
    config.ssh.key_base_path = "/tmp/keys/".to_string();
    config.ssh.key_file = "cluster.pem".to_string();
    config.distribution.retry_delay_seconds = 0;
    config
}
