//! Centralized configuration for postwire.
//!
//! Constants for the codec and the RPC layer, plus the operator-facing
//! [`TransportConfig`] used to build servers and clients.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};

/// Encoding engine limits.
pub struct WireConfig;

impl WireConfig {
    /// Upper bound on elements or bytes reserved ahead of reading them.
    ///
    /// Larger counts still decode, the buffers just grow as data arrives.
    pub const MAX_PREALLOC: usize = 4096;
    /// Width in bytes of every count and length field.
    pub const COUNT_WIDTH: usize = 8;
}

/// RPC transport defaults.
pub struct RpcConfig;

impl RpcConfig {
    pub const DEFAULT_ADDR: &'static str = "127.0.0.1:0";
    pub const DEFAULT_PATH: &'static str = "/rpc";
    pub const HEALTH_PATH: &'static str = "/health";
    pub const CONTENT_TYPE: &'static str = "application/octet-stream";
    /// Requests queued for the serving loop beyond the one in flight.
    pub const INBOUND_CAPACITY: usize = 1;
    pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024; // 16MB
}

/// Listener settings exposed to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Socket address to listen on, e.g. `127.0.0.1:8080`.
    pub addr: String,
    /// Request path served by the RPC route.
    pub path: String,
    /// Cross-origin value to allow. CORS handling is skipped when unset.
    pub allowed_origin: Option<String>,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: RpcConfig::DEFAULT_ADDR.to_string(),
            path: RpcConfig::DEFAULT_PATH.to_string(),
            allowed_origin: None,
            max_body_bytes: RpcConfig::DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl TransportConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = Some(origin.into());
        self
    }

    pub fn with_max_body_bytes(mut self, max: usize) -> Self {
        self.max_body_bytes = max;
        self
    }

    /// Check the settings before a listener is built from them.
    pub fn validate(&self) -> Result<(), TransportError> {
        if !self.path.starts_with('/') {
            return Err(TransportError::InvalidConfig {
                message: format!("request path must start with '/': {}", self.path),
            });
        }
        if self.path == RpcConfig::HEALTH_PATH {
            return Err(TransportError::InvalidConfig {
                message: format!("request path collides with {}", RpcConfig::HEALTH_PATH),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(TransportError::InvalidConfig {
                message: "max_body_bytes must be positive".to_string(),
            });
        }
        Ok(())
    }
}
