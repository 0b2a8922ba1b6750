// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Sync runtime configuration.
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! enabled = true
//! max_retries = 5
//! request_timeout_secs = 30
//! cycle_timeout_secs = 300
//! interval_secs = 3600
//! ```
//!
//! Every field is optional and falls back to its default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Tunables for the upload pump, orchestrator and background tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// When false, full sync cycles are skipped.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Failed attempts before an intent is parked (default: 5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Upper bound on a single remote call in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on a scheduled full cycle in seconds (default: 300).
    #[serde(default = "default_cycle_timeout_secs")]
    pub cycle_timeout_secs: u64,
    /// Seconds between scheduled full cycles (default: 3600).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Drain requests buffered before new ones are dropped (default: 16).
    #[serde(default = "default_drain_channel_capacity")]
    pub drain_channel_capacity: usize,
    /// Keep realtime subscriptions open while the service runs.
    #[serde(default = "default_listen")]
    pub listen: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cycle_timeout_secs() -> u64 {
    300
}

fn default_interval_secs() -> u64 {
    3600
}

fn default_drain_channel_capacity() -> usize {
    16
}

fn default_listen() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            enabled: default_enabled(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            cycle_timeout_secs: default_cycle_timeout_secs(),
            interval_secs: default_interval_secs(),
            drain_channel_capacity: default_drain_channel_capacity(),
            listen: default_listen(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from `path`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> SyncResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a TOML document.
    pub fn parse(content: &str) -> SyncResult<Self> {
        let config: SyncConfig =
            toml::from_str(content).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path` as TOML.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings that would stall or spin the runtime.
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_retries == 0 {
            return Err(SyncError::Config("max_retries must be at least 1".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config("request_timeout_secs must be positive".to_string()));
        }
        if self.cycle_timeout_secs == 0 {
            return Err(SyncError::Config("cycle_timeout_secs must be positive".to_string()));
        }
        if self.interval_secs == 0 {
            return Err(SyncError::Config("interval_secs must be positive".to_string()));
        }
        if self.drain_channel_capacity == 0 {
            return Err(SyncError::Config("drain_channel_capacity must be positive".to_string()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
