//! Session configuration.
//!
//! Every field has a default, so a config file only names what it changes:
//!
//! ```
//! use cardlab_session::SessionConfig;
//!
//! let config = SessionConfig::from_json_str(r#"{ "poller": { "block_retries": 5 } }"#).unwrap();
//! assert_eq!(config.poller.block_retries, 5);
//! assert_eq!(config.poller.version_attempts, 2);
//! assert_eq!(config.dump_capacity, 4096);
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use cardlab_core::constants::DEFAULT_DUMP_CAPACITY;
use cardlab_emulator::ListenerConfig;
use cardlab_reader::PollerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Scheduler period.
    pub tick_interval_ms: u64,
    /// Bytes backing the card dump.
    pub dump_capacity: usize,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
    pub poller: PollerConfig,
    pub listener: ListenerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            dump_capacity: DEFAULT_DUMP_CAPACITY,
            log_filter: "info".to_string(),
            poller: PollerConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// Returns `ConfigParse` for malformed JSON and `InvalidConfig` for
    /// values the engines cannot run with.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    ///
    /// # Errors
    /// Returns `ConfigRead` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| SessionError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// # Errors
    /// Returns `InvalidConfig` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(SessionError::InvalidConfig(
                "tick_interval_ms must be positive".into(),
            ));
        }
        if self.poller.block_retries == 0 {
            return Err(SessionError::InvalidConfig(
                "poller.block_retries must be positive".into(),
            ));
        }
        if self.listener.tx_capacity < 4 {
            return Err(SessionError::InvalidConfig(
                "listener.tx_capacity must hold one page".into(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}
