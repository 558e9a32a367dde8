//! vmshift.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::LoadWeights;

pub const DEFAULT_CPU_LIMIT: u8 = 75;
pub const DEFAULT_MEMORY_LIMIT: u8 = 80;
pub const DEFAULT_MAX_MIGRATIONS: u32 = 6;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("{name} must be between 0 and 100, got {value}")]
    InvalidLimit { name: &'static str, value: u32 },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShiftConfig {
    pub placement: Option<PlacementConfig>,
    pub weights: Option<WeightsConfig>,
    pub rebalance: Option<RebalanceConfig>,
    pub executor: Option<ExecutorConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub rebalance: Option<bool>,
    pub enforce_limits: Option<bool>,
    pub cpu_limit: Option<u32>,
    pub memory_limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub cpu: Option<u32>,
    pub memory: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RebalanceConfig {
    pub max_migrations: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorConfig {
    pub poll_interval_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
}

impl ShiftConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a config document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ShiftConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(p) = &self.placement {
            if let Some(v) = p.cpu_limit {
                check_limit("cpu_limit", v)?;
            }
            if let Some(v) = p.memory_limit {
                check_limit("memory_limit", v)?;
            }
        }
        Ok(())
    }

    pub fn rebalance(&self) -> bool {
        self.placement.as_ref().and_then(|p| p.rebalance).unwrap_or(false)
    }

    pub fn enforce_limits(&self) -> bool {
        self.placement
            .as_ref()
            .and_then(|p| p.enforce_limits)
            .unwrap_or(true)
    }

    pub fn cpu_limit(&self) -> u8 {
        self.placement
            .as_ref()
            .and_then(|p| p.cpu_limit)
            .map_or(DEFAULT_CPU_LIMIT, |v| v as u8)
    }

    pub fn memory_limit(&self) -> u8 {
        self.placement
            .as_ref()
            .and_then(|p| p.memory_limit)
            .map_or(DEFAULT_MEMORY_LIMIT, |v| v as u8)
    }

    pub fn load_weights(&self) -> LoadWeights {
        let defaults = LoadWeights::default();
        match &self.weights {
            Some(w) => LoadWeights {
                cpu: w.cpu.unwrap_or(defaults.cpu),
                memory: w.memory.unwrap_or(defaults.memory),
            },
            None => defaults,
        }
    }

    pub fn max_migrations(&self) -> u32 {
        self.rebalance
            .as_ref()
            .and_then(|r| r.max_migrations)
            .unwrap_or(DEFAULT_MAX_MIGRATIONS)
    }

    pub fn poll_interval_ms(&self) -> u64 {
        self.executor
            .as_ref()
            .and_then(|e| e.poll_interval_ms)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS)
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.executor.as_ref().and_then(|e| e.timeout_secs)
    }

    /// Scaffold a config with every default spelled out.
    pub fn scaffold() -> Self {
        ShiftConfig {
            placement: Some(PlacementConfig {
                rebalance: Some(false),
                enforce_limits: Some(true),
                cpu_limit: Some(u32::from(DEFAULT_CPU_LIMIT)),
                memory_limit: Some(u32::from(DEFAULT_MEMORY_LIMIT)),
            }),
            weights: Some(WeightsConfig {
                cpu: Some(50),
                memory: Some(50),
            }),
            rebalance: Some(RebalanceConfig {
                max_migrations: Some(DEFAULT_MAX_MIGRATIONS),
            }),
            executor: Some(ExecutorConfig {
                poll_interval_ms: Some(DEFAULT_POLL_INTERVAL_MS),
                timeout_secs: None,
            }),
        }
    }
}

/// Reject percentages outside `0..=100`.
pub fn check_limit(name: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > 100 {
        return Err(ConfigError::InvalidLimit { name, value });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_uses_defaults() {
        let config = ShiftConfig::parse("").unwrap();
        assert!(!config.rebalance());
        assert!(config.enforce_limits());
        assert_eq!(config.cpu_limit(), 75);
        assert_eq!(config.memory_limit(), 80);
        assert_eq!(config.max_migrations(), 6);
        assert_eq!(config.poll_interval_ms(), 500);
        assert!(config.timeout_secs().is_none());
        assert_eq!(config.load_weights(), LoadWeights::default());
    }

    #[test]
    fn test_parse_overrides() {
        let toml_str = r#"
[placement]
rebalance = true
enforce_limits = false
cpu_limit = 60

[weights]
cpu = 70

[rebalance]
max_migrations = 2
"#;
        let config = ShiftConfig::parse(toml_str).unwrap();
        assert!(config.rebalance());
        assert!(!config.enforce_limits());
        assert_eq!(config.cpu_limit(), 60);
        assert_eq!(config.memory_limit(), 80);
        assert_eq!(config.load_weights(), LoadWeights { cpu: 70, memory: 50 });
        assert_eq!(config.max_migrations(), 2);
    }

    #[test]
    fn test_rejects_limit_over_100() {
        let err = ShiftConfig::parse("[placement]\nmemory_limit = 120\n").unwrap_err();
        assert!(err.to_string().contains("memory_limit"));
    }

    #[test]
    fn test_scaffold_round_trips() {
        let toml_str = ShiftConfig::scaffold().to_toml_string().unwrap();
        assert!(toml_str.contains("max_migrations = 6"));
        let parsed = ShiftConfig::parse(&toml_str).unwrap();
        assert_eq!(parsed.cpu_limit(), 75);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vmshift.toml");
        std::fs::write(&path, "[executor]\npoll_interval_ms = 10\ntimeout_secs = 30\n").unwrap();

        let config = ShiftConfig::from_file(&path).unwrap();
        assert_eq!(config.poll_interval_ms(), 10);
        assert_eq!(config.timeout_secs(), Some(30));
    }
}
