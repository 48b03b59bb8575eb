use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Timing of the status polling loops used while waiting on stacks and tables.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay between two status queries.
    ///
    /// Default: 5000 (5 seconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Number of status queries after which a wait fails with a timeout.
    ///
    /// `None` polls until a terminal status is observed.
    /// Default: 720 (one hour at the default interval)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

impl PollingConfig {
    pub const DEFAULT_INTERVAL_MS: u64 = 5_000;

    pub const DEFAULT_MAX_ATTEMPTS: u32 = 720;

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.interval_ms == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "polling.interval_ms".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        if self.max_attempts == Some(0) {
            return Err(ValidationError::InvalidFieldValue {
                field: "polling.max_attempts".to_string(),
                constraint: "must be greater than 0 when set".to_string(),
            });
        }

        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    PollingConfig::DEFAULT_INTERVAL_MS
}

fn default_max_attempts() -> Option<u32> {
    Some(PollingConfig::DEFAULT_MAX_ATTEMPTS)
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}
