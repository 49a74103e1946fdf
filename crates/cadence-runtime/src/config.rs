// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scheduler configuration.

use cadence_core::SchedulerError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a [`SchedulerConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("failed to access scheduler config: {0}")]
    Io(#[from] std::io::Error),
    /// The contents are not valid configuration JSON.
    #[error("failed to parse scheduler config: {0}")]
    Parse(#[from] serde_json::Error),
    /// The values parsed but are out of range.
    #[error(transparent)]
    Invalid(#[from] SchedulerError),
}

/// Configuration for a [`Manager`](crate::Manager) and its executor pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of events executing at once.
    pub max_concurrency: usize,
    /// Seconds an idle worker may stay alive before it is reaped.
    pub idle_timeout_secs: f64,
    /// Minimum seconds between two reaping passes. `0.0` reaps on every tick.
    pub reap_interval_secs: f64,
    /// Overflow length above which a backpressure warning is logged.
    pub overflow_warn_threshold: usize,
    /// Prefix for worker thread names.
    pub worker_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(4),
            idle_timeout_secs: 5.0,
            reap_interval_secs: 0.0,
            overflow_warn_threshold: 1024,
            worker_name_prefix: "cadence-worker".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Writes the configuration to a JSON file.
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Checks that every value is in range.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrency == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if !(self.idle_timeout_secs.is_finite() && self.idle_timeout_secs >= 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "idle_timeout_secs must be a non-negative number, got {}",
                self.idle_timeout_secs
            )));
        }
        if !(self.reap_interval_secs.is_finite() && self.reap_interval_secs >= 0.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "reap_interval_secs must be a non-negative number, got {}",
                self.reap_interval_secs
            )));
        }
        if self.worker_name_prefix.is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "worker_name_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}
