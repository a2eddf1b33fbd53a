//! Router tuning knobs. Parsed from TOML; every field is optional and falls
//! back to its default.
//!
//! ```toml
//! max_history = 1000
//! oneshot_retention_ms = 1000
//! progress_retention_ms = 1000
//! dwell_ms = 10
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of events kept in a surface's history.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// How long a oneshot stays in the oneshot list after insertion.
pub const DEFAULT_ONESHOT_RETENTION_MS: u64 = 1000;

/// How long a finished activity's progress buffer stays inspectable.
pub const DEFAULT_PROGRESS_RETENTION_MS: u64 = 1000;

/// How long one event occupies the display slot.
pub const DEFAULT_DWELL_MS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid router config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    pub max_history: usize,
    pub oneshot_retention_ms: u64,
    pub progress_retention_ms: u64,
    pub dwell_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            oneshot_retention_ms: DEFAULT_ONESHOT_RETENTION_MS,
            progress_retention_ms: DEFAULT_PROGRESS_RETENTION_MS,
            dwell_ms: DEFAULT_DWELL_MS,
        }
    }
}

impl RouterConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Retention delays may be zero (retire on the next tick); history size
    /// and dwell may not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 {
            return Err(ConfigError::Zero {
                field: "max_history",
            });
        }
        if self.dwell_ms == 0 {
            return Err(ConfigError::Zero { field: "dwell_ms" });
        }
        Ok(())
    }
}
