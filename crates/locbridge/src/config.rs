// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Engine configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! supl_version = 0x20000
//! intermediate_pos = true
//! accuracy_threshold_m = 500
//! atl_ack_delay_ms = 10
//!
//! [supl_server]
//! host = "supl.example.net"
//! port = 7275
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::capabilities;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SUPL protocol version pushed to the modem after every client open.
    #[serde(default = "default_supl_version")]
    pub supl_version: u32,

    /// Capability bits reported to the host at init.
    #[serde(default = "default_capabilities")]
    pub capabilities: u32,

    /// Deliver intermediate (in-progress) position reports.
    #[serde(default)]
    pub intermediate_pos: bool,

    /// Drop intermediate positions whose horizontal uncertainty exceeds this
    /// many meters (0 disables the filter).
    #[serde(default)]
    pub accuracy_threshold_m: u32,

    /// Delay before each data-connection acknowledgment to the modem.
    #[serde(default = "default_ack_delay")]
    pub atl_ack_delay_ms: u64,

    /// Maximum number of modem events buffered between worker passes.
    #[serde(default = "default_queue_depth")]
    pub event_queue_depth: usize,

    /// Name of the deferred-action worker thread.
    #[serde(default = "default_thread_name")]
    pub worker_thread_name: String,

    /// SUPL server applied at init.
    #[serde(default)]
    pub supl_server: Option<ServerConfig>,

    /// C2K (CDMA PDE) server applied at init.
    #[serde(default)]
    pub c2k_server: Option<ServerConfig>,
}

/// A `host:port` server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

fn default_supl_version() -> u32 {
    0x0001_0000
}

fn default_capabilities() -> u32 {
    capabilities::SCHEDULING | capabilities::MSB | capabilities::MSA
}

fn default_ack_delay() -> u64 {
    10
}

fn default_queue_depth() -> usize {
    16
}

fn default_thread_name() -> String {
    "loc_api".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            supl_version: default_supl_version(),
            capabilities: default_capabilities(),
            intermediate_pos: false,
            accuracy_threshold_m: 0,
            atl_ack_delay_ms: default_ack_delay(),
            event_queue_depth: default_queue_depth(),
            worker_thread_name: default_thread_name(),
            supl_server: None,
            c2k_server: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the acknowledgment delay.
    pub fn with_ack_delay_ms(mut self, delay_ms: u64) -> Self {
        self.atl_ack_delay_ms = delay_ms;
        self
    }

    /// Enable or disable intermediate position reports.
    pub fn with_intermediate_pos(mut self, enabled: bool) -> Self {
        self.intermediate_pos = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "event_queue_depth must be at least 1".into(),
            ));
        }

        if self.worker_thread_name.is_empty() {
            return Err(ConfigError::Invalid("worker_thread_name is empty".into()));
        }

        for (name, server) in [("supl_server", &self.supl_server), ("c2k_server", &self.c2k_server)] {
            if let Some(server) = server {
                if server.host.is_empty() {
                    return Err(ConfigError::Invalid(format!("{} has empty host", name)));
                }
                if server.port == 0 {
                    return Err(ConfigError::Invalid(format!("{} has port 0", name)));
                }
            }
        }

        Ok(())
    }
}
