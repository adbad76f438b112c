//! Core configuration.
//!
//! # Responsibility
//! - Hold tunables for drag activation, optimistic sync, and logging.
//! - Parse them from JSON and reject values core cannot honor.
//!
//! # Invariants
//! - A validated config has a positive, finite activation distance.
//! - The temporary id prefix is non-empty ASCII without whitespace, so
//!   temporary ids are distinguishable from server ids.

use crate::logging::{default_log_level, normalize_level};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Default pointer travel before a press becomes a drag.
pub const DEFAULT_ACTIVATION_DISTANCE: f64 = 8.0;
/// Default prefix of client-generated ids awaiting reconciliation.
pub const DEFAULT_TEMP_ID_PREFIX: &str = "tmp-";

/// Errors from loading or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    InvalidActivationDistance(f64),
    InvalidTempIdPrefix(String),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::InvalidActivationDistance(value) => {
                write!(f, "activation distance must be positive and finite, got {value}")
            }
            Self::InvalidTempIdPrefix(value) => {
                write!(f, "temporary id prefix is invalid: `{value}`")
            }
            Self::InvalidLogLevel(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Drag gesture tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DragConfig {
    pub activation_distance: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self {
            activation_distance: DEFAULT_ACTIVATION_DISTANCE,
        }
    }
}

/// Optimistic sync tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub temp_id_prefix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            temp_id_prefix: DEFAULT_TEMP_ID_PREFIX.to_string(),
        }
    }
}

/// Logging bootstrap settings passed to `init_logging`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub drag: DragConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Parses and validates a JSON config document. Missing keys use defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let distance = self.drag.activation_distance;
        if !distance.is_finite() || distance <= 0.0 {
            return Err(ConfigError::InvalidActivationDistance(distance));
        }

        let prefix = self.sync.temp_id_prefix.as_str();
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_graphic()) {
            return Err(ConfigError::InvalidTempIdPrefix(prefix.to_string()));
        }

        normalize_level(&self.logging.level).map_err(ConfigError::InvalidLogLevel)?;
        Ok(())
    }
}
