//! Session configuration
//!
//! Configuration crosses the bridge as an opaque byte sequence; this module
//! owns its decoding. The wire form is a JSON object with optional fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Configuration applied when a session is created or devices are listed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Number of virtual CPU devices to expose
    pub cpu_device_count: u32,

    /// Per-device memory limit in bytes (0 = unlimited)
    pub memory_limit_bytes: u64,

    /// Log which device each evaluated operation landed on
    pub log_device_placement: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cpu_device_count: 1,
            memory_limit_bytes: 0,
            log_device_placement: false,
        }
    }
}

impl SessionConfig {
    /// Decode configuration bytes; malformed input is a caller error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::ConfigParse(e.to_string()))
    }
}
