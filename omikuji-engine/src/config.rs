//! Engine configuration loaded from JSON with per-field defaults.

use crate::constants::SESSION_TTL_SECS;
use crate::emotion::{EmotionModel, EmotionTable};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised when configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("bottom rank {bottom} must be below top rank {top}")]
    RankBounds { bottom: i32, top: i32 },
    #[error("tier rank {rank} must lie strictly between {bottom} and {top}")]
    TierOutsideBounds { rank: i32, bottom: i32, top: i32 },
    #[error("tier rank {rank} distribution is not normalized (sum {sum:.6})")]
    DistributionNotNormalized { rank: i32, sum: f64 },
    #[error("tier rank {rank} must not be a single-outcome distribution")]
    IntermediateExtreme { rank: i32 },
    #[error("tier rank {rank} follows rank {previous}; tiers must be ascending")]
    TiersOutOfOrder { previous: i32, rank: i32 },
    #[error("tier rank {rank} breaks tone monotonicity after rank {previous}")]
    NotMonotonic { previous: i32, rank: i32 },
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: u64,
        value: u64,
    },
    #[error("invalid configuration JSON: {0}")]
    Parse(String),
}

/// Tunable engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub emotion: EmotionTable,
}

impl EngineConfig {
    const fn default_session_ttl_secs() -> u64 {
        SESSION_TTL_SECS
    }

    /// Parse and validate configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and any validation
    /// error otherwise.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every configured invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_ttl_secs == 0 {
            return Err(ConfigError::MinViolation {
                field: "session_ttl_secs",
                min: 1,
                value: 0,
            });
        }
        self.emotion.validate()
    }

    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Build the validated emotion model described by this config.
    ///
    /// # Errors
    ///
    /// Returns the first constraint the emotion table violates.
    pub fn emotion_model(&self) -> Result<EmotionModel, ConfigError> {
        EmotionModel::new(self.emotion.clone())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: Self::default_session_ttl_secs(),
            emotion: EmotionTable::default(),
        }
    }
}
