use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use crate::orchestration::events::Strategy;
use crate::orchestration::shell::{DEFAULT_SHELL, DEFAULT_TIMEOUT_SECS};
use crate::{Error, Result};

/// Environment variable overriding `max_concurrent`.
pub const MAX_CONCURRENT_ENV: &str = "SWARM_MAX_CONCURRENT";

fn default_max_concurrent() -> usize {
    3
}

fn default_unit_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Concurrency bound for the parallel strategy.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Optional concurrency bound for the dependency-graph strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_max_concurrent: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default = "default_unit_timeout_secs")]
    pub unit_timeout_secs: u64,
    #[serde(default)]
    pub default_strategy: Strategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            graph_max_concurrent: None,
            default_model: None,
            shell: None,
            unit_timeout_secs: default_unit_timeout_secs(),
            default_strategy: Strategy::default(),
        }
    }
}

impl Config {
    pub fn swarm_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".swarm"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::swarm_dir()?.join("swarm.toml"))
    }

    pub fn log_path() -> Result<PathBuf> {
        Ok(Self::swarm_dir()?.join("swarm.log"))
    }

    pub fn effective_shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(DEFAULT_SHELL)
    }

    /// Load `~/.swarm/swarm.toml`, falling back to defaults when it is
    /// missing, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        debug!(path = %path.display(), "Config::load");
        let config = if path.exists() {
            Self::load_from(&path)?
        } else {
            debug!("Config file not found, using defaults");
            Self::default()
        };
        config.with_env_overrides()
    }

    /// Parse and validate a config file at an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        debug!(
            max_concurrent = config.max_concurrent,
            graph_max_concurrent = ?config.graph_max_concurrent,
            default_strategy = %config.default_strategy,
            "Config loaded"
        );
        Ok(config)
    }

    /// Apply `SWARM_MAX_CONCURRENT` if set.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_max_concurrent_override(std::env::var(MAX_CONCURRENT_ENV).ok().as_deref())
    }

    fn with_max_concurrent_override(mut self, value: Option<&str>) -> Result<Self> {
        if let Some(raw) = value {
            self.max_concurrent = raw.trim().parse().map_err(|_| {
                Error::Validation(format!(
                    "{} must be a positive integer, got '{}'",
                    MAX_CONCURRENT_ENV, raw
                ))
            })?;
            self.validate()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::Validation(
                "max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.graph_max_concurrent == Some(0) {
            return Err(Error::Validation(
                "graph_max_concurrent must be at least 1".to_string(),
            ));
        }
        if self.unit_timeout_secs == 0 {
            return Err(Error::Validation(
                "unit_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.validate()?;
        Self::ensure_dirs()?;
        let path = Self::config_path()?;
        fs::write(&path, self.to_toml()?)?;
        debug!(path = %path.display(), "Config saved");
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn ensure_dirs() -> Result<()> {
        let swarm_dir = Self::swarm_dir()?;
        if !swarm_dir.exists() {
            debug!(dir = %swarm_dir.display(), "Creating swarm directory");
            fs::create_dir_all(&swarm_dir)?;
        }
        Ok(())
    }
}
