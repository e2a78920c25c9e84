//! Configuration loaded from `~/.mnemos/config.toml` with environment overrides.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::Error;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemosConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub reasoning: ReasoningConfig,
    pub cache: CacheConfig,
    pub detection: DetectionConfig,
    pub retry: RetryConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReasoningConfig {
    pub provider: String,
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:11434/v1`.
    pub endpoint: String,
    pub model: String,
    /// Name of the env var holding the bearer token. Unset var means no auth.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Tier-1 (in-process LRU) capacity in entries.
    pub capacity: usize,
    /// Tier-2 (durable) entry lifetime.
    pub ttl_days: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    pub duplicate_threshold: f64,
    pub contradiction_threshold: f64,
    pub max_candidates: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HealthConfig {
    pub interval_secs: u64,
    pub failure_threshold: u32,
    pub window_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemos_dir()
            .join("mnemos.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_mnemos_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "all-MiniLM-L6-v2".into(),
            cache_dir,
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            endpoint: "http://localhost:11434/v1".into(),
            model: "llama3.2".into(),
            api_key_env: "MNEMOS_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            ttl_days: 30,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            duplicate_threshold: 0.85,
            contradiction_threshold: 0.70,
            max_candidates: 10,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 10_000,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            failure_threshold: 3,
            window_size: 100,
        }
    }
}

/// Largest accepted `cache.ttl_days` (about a century).
pub const MAX_TTL_DAYS: u64 = 36_500;

impl CacheConfig {
    /// `None` when `ttl_days` is too large to represent.
    pub fn ttl(&self) -> Option<chrono::Duration> {
        i64::try_from(self.ttl_days)
            .ok()
            .and_then(chrono::Duration::try_days)
    }
}

impl ReasoningConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HealthConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Returns `~/.mnemos/`
pub fn default_mnemos_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".mnemos")
}

/// Returns the default config file path: `~/.mnemos/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mnemos_dir().join("config.toml")
}

impl MnemosConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, apply env var overrides, then validate.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemosConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MNEMOS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMOS_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MNEMOS_REASONING_ENDPOINT") {
            self.reasoning.endpoint = val;
        }
        if let Ok(val) = std::env::var("MNEMOS_REASONING_MODEL") {
            self.reasoning.model = val;
        }
    }

    /// Reject values the engine cannot operate with.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        let d = &self.detection;
        for (field, value) in [
            ("detection.duplicate_threshold", d.duplicate_threshold),
            ("detection.contradiction_threshold", d.contradiction_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(Error::invalid_config(field, "must be within [-1, 1]"));
            }
        }
        if d.contradiction_threshold > d.duplicate_threshold {
            return Err(Error::invalid_config(
                "detection.contradiction_threshold",
                "must not exceed duplicate_threshold",
            ));
        }
        if d.max_candidates == 0 {
            return Err(Error::invalid_config("detection.max_candidates", "must be > 0"));
        }
        if self.cache.capacity == 0 {
            return Err(Error::invalid_config("cache.capacity", "must be > 0"));
        }
        if self.cache.ttl_days > MAX_TTL_DAYS {
            return Err(Error::invalid_config(
                "cache.ttl_days",
                format!("must be <= {MAX_TTL_DAYS}"),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::invalid_config("retry.max_attempts", "must be > 0"));
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::invalid_config(
                "retry.backoff_multiplier",
                "must be >= 1.0",
            ));
        }
        if self.health.interval_secs == 0 {
            return Err(Error::invalid_config("health.interval_secs", "must be > 0"));
        }
        if self.health.failure_threshold == 0 {
            return Err(Error::invalid_config("health.failure_threshold", "must be > 0"));
        }
        if self.health.window_size == 0 {
            return Err(Error::invalid_config("health.window_size", "must be > 0"));
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemosConfig::default();
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.cache.capacity, 1000);
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.detection.duplicate_threshold, 0.85);
        assert_eq!(config.detection.contradiction_threshold, 0.70);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.health.failure_threshold, 3);
        assert!(config.storage.db_path.ends_with("mnemos.db"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
db_path = "/tmp/test.db"

[detection]
duplicate_threshold = 0.9

[retry]
max_attempts = 5
"#;
        let config: MnemosConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.detection.duplicate_threshold, 0.9);
        assert_eq!(config.retry.max_attempts, 5);
        // defaults still apply for unset fields
        assert_eq!(config.detection.contradiction_threshold, 0.70);
        assert_eq!(config.retry.max_delay_ms, 10_000);
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut config = MnemosConfig::default();
        config.detection.contradiction_threshold = 0.95;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("contradiction_threshold"));
    }

    #[test]
    fn validate_rejects_zero_capacity() {
        let mut config = MnemosConfig::default();
        config.cache.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_huge_ttl() {
        let mut config = MnemosConfig::default();
        config.cache.ttl_days = 200_000_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("cache.ttl_days"));

        config.cache.ttl_days = MAX_TTL_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ttl_out_of_range_is_none() {
        let config = CacheConfig {
            ttl_days: u64::MAX,
            ..CacheConfig::default()
        };
        assert!(config.ttl().is_none());
        assert_eq!(CacheConfig::default().ttl(), chrono::Duration::try_days(30));
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let mut config = MnemosConfig::default();
        config.health.interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health.interval_secs"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MnemosConfig::default();
        std::env::set_var("MNEMOS_DB", "/tmp/override.db");
        std::env::set_var("MNEMOS_LOG_LEVEL", "trace");
        std::env::set_var("MNEMOS_REASONING_MODEL", "qwen2.5");

        config.apply_env_overrides();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.reasoning.model, "qwen2.5");

        // Clean up
        std::env::remove_var("MNEMOS_DB");
        std::env::remove_var("MNEMOS_LOG_LEVEL");
        std::env::remove_var("MNEMOS_REASONING_MODEL");
    }

    #[test]
    fn load_from_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = MnemosConfig::load_from(tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.cache.capacity, 1000);
    }
}
