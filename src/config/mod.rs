use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::check::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT_SECS, ProbeOptions};
use crate::subscribe::DEFAULT_USER_AGENT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // 检测参数，非法值在 probe_options() 中规范化
    pub concurrency: i64,
    /// 单次探测超时（秒）
    pub timeout: i64,

    // 订阅配置
    pub subscription_url: Option<String>,
    pub subscription_timeout: u64,
    pub user_agent: String,

    // 输出配置
    pub print_progress: bool,
    pub output: Option<String>,

    // 日志配置
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY as i64,
            timeout: DEFAULT_TIMEOUT_SECS as i64,
            subscription_url: None,
            subscription_timeout: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            print_progress: true,
            output: None,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions::new(self.concurrency, self.timeout)
    }

    pub fn get_subscription_timeout(&self) -> Duration {
        Duration::from_secs(self.subscription_timeout.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "concurrency: 32\nsubscription_url: https://sub.example.com/link").unwrap();

        let config = Config::load_from_file(file.path()).unwrap();
        assert_eq!(config.concurrency, 32);
        assert_eq!(
            config.subscription_url.as_deref(),
            Some("https://sub.example.com/link")
        );
        assert_eq!(config.timeout, 5);
        assert!(config.print_progress);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn invalid_values_are_normalised() {
        let config = Config {
            concurrency: 0,
            timeout: -3,
            subscription_timeout: 0,
            ..Config::default()
        };
        let options = config.probe_options();
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.timeout, Duration::from_secs(30));
        assert_eq!(config.get_subscription_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load_from_file("/nonexistent/config.yaml").is_err());
    }
}
