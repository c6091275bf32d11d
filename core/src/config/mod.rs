use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{FileEngineError, Result};
use crate::identity::DEFAULT_TENANT;
use crate::transfer::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE};

/// Default service host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default service port.
pub const DEFAULT_PORT: u16 = 50051;

/// Connection and transfer settings for a `ManagedFiles` session.
///
/// Every field has a serde default, so a partial JSON/TOML document (or `{}`)
/// yields a usable configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_tenant")]
    pub tenant: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Deadline for one whole remote call, including every chunk of a
    /// transfer. `None` waits indefinitely.
    #[serde(default)]
    pub call_timeout_ms: Option<u64>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Local guard on upload and download size.
    #[serde(default)]
    pub max_payload_size: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            tenant: default_tenant(),
            connect_timeout_ms: default_connect_timeout_ms(),
            call_timeout_ms: None,
            chunk_size: default_chunk_size(),
            max_payload_size: None,
        }
    }
}

impl ClientConfig {
    /// Build a config from a `host:port` address, defaults elsewhere.
    pub fn from_address(address: &str) -> Result<Self> {
        let (host, port) = address
            .rsplit_once(':')
            .ok_or_else(|| FileEngineError::Config(format!("Address '{address}' lacks a port")))?;
        let port = port
            .parse::<u16>()
            .map_err(|e| FileEngineError::Config(format!("Invalid port in '{address}': {e}")))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        Ok(Self {
            host: host.to_string(),
            port,
            ..Self::default()
        })
    }

    /// `host:port` form used for connecting and logging.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }

    /// Check invariants that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(FileEngineError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(FileEngineError::Config("port must not be 0".to_string()));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(FileEngineError::Config(format!(
                "chunk_size must be in 1..={MAX_CHUNK_SIZE}, got {}",
                self.chunk_size
            )));
        }
        if self.connect_timeout_ms == 0 {
            return Err(FileEngineError::Config(
                "connect_timeout_ms must not be 0".to_string(),
            ));
        }
        if self.call_timeout_ms == Some(0) {
            return Err(FileEngineError::Config(
                "call_timeout_ms must not be 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
