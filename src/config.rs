//! Shard configuration.
//!
//! One source of truth for runtime knobs, loaded from environment variables
//! with sensible defaults and validated before use.

use snafu::Snafu;

use crate::constants::{COORD_SHARD_ID, MAX_CONCURRENT_PROGRAMS, NMAP_SPACE};

#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// An environment variable holds a value that does not parse or is out
    /// of range.
    #[snafu(display("invalid value {value:?} for {key}: {reason}"))]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration of one shard.
#[derive(Debug, Clone)]
pub struct ShardConfig {
    /// This shard's identifier; never the coordinator's reserved id.
    pub shard_id: u64,
    /// Bound on concurrently executing program invocations.
    pub max_inflight_hops: usize,
    /// Directory space name, overridable for test isolation.
    pub nmap_space: String,
}

impl ShardConfig {
    /// Defaults for the given shard id.
    pub fn for_shard(shard_id: u64) -> Self {
        Self {
            shard_id,
            max_inflight_hops: MAX_CONCURRENT_PROGRAMS,
            nmap_space: NMAP_SPACE.to_string(),
        }
    }

    /// Load from environment variables.
    ///
    /// `WEFT_SHARD_ID` (required), `WEFT_MAX_INFLIGHT_HOPS`,
    /// `WEFT_NMAP_SPACE`.
    pub fn load() -> Result<Self, ConfigError> {
        let shard_id = require_u64("WEFT_SHARD_ID")?;
        let mut config = Self::for_shard(shard_id);

        if let Ok(raw) = std::env::var("WEFT_MAX_INFLIGHT_HOPS") {
            config.max_inflight_hops =
                raw.parse::<usize>().map_err(|e| ConfigError::InvalidValue {
                    key: "WEFT_MAX_INFLIGHT_HOPS",
                    value: raw.clone(),
                    reason: e.to_string(),
                })?;
        }
        if let Ok(space) = std::env::var("WEFT_NMAP_SPACE") {
            config.nmap_space = space;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the runtime cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_id == COORD_SHARD_ID {
            return Err(ConfigError::InvalidValue {
                key: "WEFT_SHARD_ID",
                value: self.shard_id.to_string(),
                reason: "reserved for the coordinator sink".to_string(),
            });
        }
        if self.max_inflight_hops == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WEFT_MAX_INFLIGHT_HOPS",
                value: "0".to_string(),
                reason: "at least one program must be able to run".to_string(),
            });
        }
        if self.nmap_space.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "WEFT_NMAP_SPACE",
                value: String::new(),
                reason: "directory space name cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn require_u64(key: &'static str) -> Result<u64, ConfigError> {
    let raw = std::env::var(key).map_err(|_| ConfigError::InvalidValue {
        key,
        value: String::new(),
        reason: "not set".to_string(),
    })?;
    raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.clone(),
        reason: e.to_string(),
    })
}
