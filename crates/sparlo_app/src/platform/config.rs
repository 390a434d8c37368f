//! App configuration: `sparlo.ron` in the working directory, then environment overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use serde::{Deserialize, Serialize};
use sparlo_core::DEFAULT_SCROLL_OFFSET;
use sparlo_engine::{ApiAuth, ClientSettings, DEFAULT_BASE_URL};
use sparlo_logging::{parse_level, LogDestination};

pub const CONFIG_FILENAME: &str = "sparlo.ron";

pub const ENV_CONFIG_PATH: &str = "SPARLO_CONFIG";
pub const ENV_API_URL: &str = "SPARLO_API_URL";
pub const ENV_API_TOKEN: &str = "SPARLO_API_TOKEN";
pub const ENV_BENCHMARK_KEY: &str = "BENCHMARK_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: ron::error::SpannedError,
    },
    #[error("unknown log level {0:?}")]
    LogLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    /// Bearer token for the app's own API. Usually left to `SPARLO_API_TOKEN`.
    pub api_token: Option<String>,
    /// Key for the benchmark endpoints. Usually left to `BENCHMARK_API_KEY`.
    pub benchmark_key: Option<String>,
    pub export_dir: PathBuf,
    pub log_level: String,
    pub log_target: LogTarget,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub stream_idle_timeout_secs: u64,
    /// Distance from the viewport top at which a section counts as active.
    pub scroll_offset: f64,
    pub tick_millis: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        let client = ClientSettings::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_token: None,
            benchmark_key: None,
            export_dir: PathBuf::from("exports"),
            log_level: "info".to_string(),
            log_target: LogTarget::File,
            connect_timeout_secs: client.connect_timeout.as_secs(),
            request_timeout_secs: client.request_timeout.as_secs(),
            stream_idle_timeout_secs: client.stream_idle_timeout.as_secs(),
            scroll_offset: DEFAULT_SCROLL_OFFSET,
            tick_millis: 250,
        }
    }
}

impl AppConfig {
    /// Reads the config file named by `SPARLO_CONFIG`, else `./sparlo.ron`,
    /// then applies environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILENAME));
        let mut config = Self::from_file(&path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        ron::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(url) = non_empty(ENV_API_URL) {
            self.base_url = url.trim().trim_end_matches('/').to_string();
        }
        if let Some(token) = non_empty(ENV_API_TOKEN) {
            self.api_token = Some(token);
        }
        if let Some(key) = non_empty(ENV_BENCHMARK_KEY) {
            self.benchmark_key = Some(key);
        }
    }

    pub fn log_level(&self) -> Result<LevelFilter, ConfigError> {
        parse_level(&self.log_level).ok_or_else(|| ConfigError::LogLevel(self.log_level.clone()))
    }

    /// A user token wins over the benchmark key when both are set.
    pub fn auth(&self) -> ApiAuth {
        match (&self.api_token, &self.benchmark_key) {
            (Some(token), _) => ApiAuth::Bearer(token.clone()),
            (None, Some(key)) => ApiAuth::BenchmarkKey(key.clone()),
            (None, None) => ApiAuth::Anonymous,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.base_url.clone(),
            auth: self.auth(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            stream_idle_timeout: Duration::from_secs(self.stream_idle_timeout_secs),
            ..ClientSettings::default()
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_millis.max(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::from_file(&temp.path().join("absent.ron")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r#"(base_url: "http://localhost:3000", log_level: "debug", log_target: Both)"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.log_level().unwrap(), LevelFilter::Debug);
        assert_eq!(config.log_target, LogTarget::Both);
        assert_eq!(config.export_dir, PathBuf::from("exports"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILENAME);
        fs::write(&path, "(base_url: ").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_API_URL, "https://staging.example.com/"),
            (ENV_BENCHMARK_KEY, "bench"),
            (ENV_API_TOKEN, "  "),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.base_url, "https://staging.example.com");
        assert_eq!(config.auth(), ApiAuth::BenchmarkKey("bench".into()));

        config.api_token = Some("user".into());
        assert_eq!(config.auth(), ApiAuth::Bearer("user".into()));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let config = AppConfig {
            log_level: "chatty".into(),
            ..AppConfig::default()
        };
        assert!(matches!(config.log_level(), Err(ConfigError::LogLevel(_))));
    }
}
