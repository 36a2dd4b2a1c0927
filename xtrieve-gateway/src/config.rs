//! Gateway configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via XTRIEVE_CONFIG or --config)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use xtrieve_protocol::{
    SerialFramerConfig, DEFAULT_BAUD_RATE, DEFAULT_LINK_PORT, DEFAULT_PORT, MAX_DATA_LEN,
};

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial link side.
    pub link: LinkConfig,
    /// Engine connection side.
    pub engine: EngineConfig,
    /// Engine reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl Config {
    /// Loads configuration from the file named by `XTRIEVE_CONFIG`, then
    /// applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os("XTRIEVE_CONFIG").map(PathBuf::from);
        Self::load_from(path.as_deref())
    }

    /// Loads configuration from `path` (defaults when `None`), applies
    /// environment variable overrides and validates the result.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        self.link.apply_env_overrides();
        self.engine.apply_env_overrides();
        self.reconnect.apply_env_overrides();
    }

    /// Checks values that would make the gateway misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.link.byte_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "link.byte_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.engine.addr.is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.addr must not be empty".to_string(),
            ));
        }
        if self.reconnect.max_backoff_ms < self.reconnect.initial_backoff_ms {
            return Err(ConfigError::ValidationError(format!(
                "reconnect.max_backoff_ms ({}) is below reconnect.initial_backoff_ms ({})",
                self.reconnect.max_backoff_ms, self.reconnect.initial_backoff_ms
            )));
        }
        Ok(())
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }

    /// Framer settings for each accepted link.
    pub fn framer_config(&self) -> SerialFramerConfig {
        let mut framer = SerialFramerConfig::default()
            .with_byte_timeout(self.link.byte_timeout())
            .with_max_data_len(self.engine.max_data_len);
        if let Some(timeout) = self.link.sync_timeout() {
            framer = framer.with_sync_timeout(timeout);
        }
        framer
    }
}

/// Serial link configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Address the null-modem listener binds to.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Nominal line rate. Informational only; the emulated line sets its own pace.
    pub baud_rate: u32,
    /// Per-byte timeout once a frame has started, in milliseconds.
    pub byte_timeout_ms: u64,
    /// Longest wait for a sync marker, in milliseconds. 0 waits forever.
    pub sync_timeout_ms: u64,
    /// Maximum concurrent links.
    pub max_links: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_LINK_PORT)),
            baud_rate: DEFAULT_BAUD_RATE,
            byte_timeout_ms: 1000,
            sync_timeout_ms: 0,
            max_links: 16,
        }
    }
}

impl LinkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("XTRIEVE_LINK_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("XTRIEVE_BYTE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.byte_timeout_ms = ms;
            }
        }

        if let Ok(timeout) = std::env::var("XTRIEVE_SYNC_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.sync_timeout_ms = ms;
            }
        }

        if let Ok(max) = std::env::var("XTRIEVE_MAX_LINKS") {
            if let Ok(n) = max.parse() {
                self.max_links = n;
            }
        }
    }

    pub fn byte_timeout(&self) -> Duration {
        Duration::from_millis(self.byte_timeout_ms)
    }

    pub fn sync_timeout(&self) -> Option<Duration> {
        match self.sync_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Engine connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine address as `host:port`.
    pub addr: String,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Bound on each read while waiting for a response, in milliseconds. 0 waits forever.
    pub read_timeout_ms: u64,
    /// Ceiling on `data_len` in either direction.
    pub max_data_len: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            connect_timeout_ms: 5000,
            read_timeout_ms: 30_000,
            max_data_len: MAX_DATA_LEN,
        }
    }
}

impl EngineConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("XTRIEVE_ENGINE_ADDR") {
            if !addr.is_empty() {
                self.addr = addr;
            }
        }

        if let Ok(timeout) = std::env::var("XTRIEVE_CONNECT_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.connect_timeout_ms = ms;
            }
        }

        if let Ok(max) = std::env::var("XTRIEVE_MAX_DATA_LEN") {
            if let Ok(n) = max.parse() {
                self.max_data_len = n;
            }
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        match self.read_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Engine reconnection policy.
///
/// After an engine-side failure the connection is re-established before the
/// next request is read. Each failed attempt doubles the delay, capped at
/// `max_backoff_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Establishment attempts before giving up. 0 retries forever.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound on the delay, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 5000,
        }
    }
}

impl ReconnectConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(attempts) = std::env::var("XTRIEVE_RECONNECT_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.max_attempts = n;
            }
        }

        if let Ok(backoff) = std::env::var("XTRIEVE_RECONNECT_BACKOFF_MS") {
            if let Ok(ms) = backoff.parse() {
                self.initial_backoff_ms = ms;
            }
        }
    }

    /// Whether another attempt is allowed after `attempts` have failed.
    pub fn allows(&self, attempts: u32) -> bool {
        self.max_attempts == 0 || attempts < self.max_attempts
    }

    /// Delay before the attempt following `failed` failures (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let shift = failed.saturating_sub(1).min(32);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.link.bind_addr.port(), 7418);
        assert_eq!(config.link.baud_rate, 115_200);
        assert_eq!(config.link.byte_timeout(), Duration::from_secs(1));
        assert_eq!(config.link.sync_timeout(), None);
        assert_eq!(config.engine.addr, "127.0.0.1:7419");
        assert_eq!(config.reconnect.max_attempts, 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = Config::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.link.bind_addr, config.link.bind_addr);
        assert_eq!(parsed.engine.addr, config.engine.addr);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
link:
  bind_addr: "127.0.0.1:9000"
  sync_timeout_ms: 250
engine:
  addr: "engine.local:7419"
reconnect:
  max_attempts: 0
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.link.bind_addr.port(), 9000);
        assert_eq!(config.link.sync_timeout(), Some(Duration::from_millis(250)));
        // Unset fields keep their defaults.
        assert_eq!(config.link.byte_timeout_ms, 1000);
        assert_eq!(config.engine.addr, "engine.local:7419");
        assert_eq!(config.reconnect.max_attempts, 0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");

        let mut config = Config::default();
        config.link.max_links = 3;
        config.save(&path).unwrap();

        let reloaded = Config::from_file(&path).unwrap();
        assert_eq!(reloaded.link.max_links, 3);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let result = Config::from_file("/nonexistent/gateway.yaml");
        assert!(matches!(result, Err(ConfigError::IoError(..))));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "link:\n  bind_addr: \"not an address\"").unwrap();
        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(..))));
    }

    #[test]
    fn test_load_from_validates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "link:\n  byte_timeout_ms: 0").unwrap();
        let result = Config::load_from(Some(file.path()));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.link.byte_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.reconnect.initial_backoff_ms = 10_000;
        config.reconnect.max_backoff_ms = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_backoff_ms"));
    }

    #[test]
    fn test_framer_config() {
        let mut config = Config::default();
        config.link.byte_timeout_ms = 200;
        config.link.sync_timeout_ms = 5000;
        config.engine.max_data_len = 4096;

        let framer = config.framer_config();
        assert_eq!(framer.byte_timeout, Duration::from_millis(200));
        assert_eq!(framer.sync_timeout, Some(Duration::from_secs(5)));
        assert_eq!(framer.max_data_len, 4096);
    }

    #[test]
    fn test_reconnect_policy() {
        let policy = ReconnectConfig::default();
        assert!(policy.allows(0));
        assert!(!policy.allows(1));

        let forever = ReconnectConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(forever.allows(1_000_000));

        let backoff = ReconnectConfig {
            max_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
        };
        assert_eq!(backoff.backoff(1), Duration::from_millis(100));
        assert_eq!(backoff.backoff(2), Duration::from_millis(200));
        assert_eq!(backoff.backoff(4), Duration::from_millis(800));
        assert_eq!(backoff.backoff(5), Duration::from_millis(1000));
        assert_eq!(backoff.backoff(64), Duration::from_millis(1000));
    }
}
