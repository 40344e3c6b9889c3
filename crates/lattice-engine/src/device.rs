//! Execution devices
//!
//! Devices are instantiated transiently for enumeration and for session
//! placement; a device set built for enumeration is dropped as soon as its
//! attributes have been serialized.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{Error, Result};

/// Upper bound on virtual devices a single configuration may request
const MAX_DEVICES: u32 = 64;

static NEXT_INCARNATION: AtomicU64 = AtomicU64::new(1);

/// Serializable description of one device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceAttributes {
    /// Stable name, e.g. `"cpu:0"`
    pub name: String,
    /// Device kind, e.g. `"CPU"`
    pub device_type: String,
    /// Memory limit in bytes (0 = unlimited)
    pub memory_limit_bytes: u64,
    /// Unique per instantiation; distinguishes re-created devices
    pub incarnation: u64,
}

/// A live execution device
#[derive(Debug)]
pub struct Device {
    attributes: DeviceAttributes,
}

impl Device {
    fn cpu(index: u32, memory_limit_bytes: u64) -> Self {
        Self {
            attributes: DeviceAttributes {
                name: format!("cpu:{}", index),
                device_type: "CPU".to_string(),
                memory_limit_bytes,
                incarnation: NEXT_INCARNATION.fetch_add(1, Ordering::Relaxed),
            },
        }
    }

    pub fn attributes(&self) -> &DeviceAttributes {
        &self.attributes
    }
}

/// Instantiate the device set a configuration describes
///
/// Fails without leaving any device behind; a partially built set is
/// dropped when the error propagates.
pub fn instantiate_devices(config: &SessionConfig) -> Result<Vec<Device>> {
    if config.cpu_device_count == 0 {
        return Err(Error::InvalidArgument(
            "configuration requests zero devices".into(),
        ));
    }
    if config.cpu_device_count > MAX_DEVICES {
        return Err(Error::InvalidArgument(format!(
            "configuration requests {} devices, limit is {}",
            config.cpu_device_count, MAX_DEVICES
        )));
    }

    let mut devices = Vec::with_capacity(config.cpu_device_count as usize);
    for index in 0..config.cpu_device_count {
        devices.push(Device::cpu(index, config.memory_limit_bytes));
    }
    tracing::debug!(count = devices.len(), "devices_instantiated");
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_yields_one_cpu() {
        let devices = instantiate_devices(&SessionConfig::default()).unwrap();
        assert_eq!(devices.len(), 1);
        let attrs = devices[0].attributes();
        assert_eq!(attrs.name, "cpu:0");
        assert_eq!(attrs.device_type, "CPU");
    }

    #[test]
    fn test_incarnations_are_unique() {
        let first = instantiate_devices(&SessionConfig::default()).unwrap();
        let second = instantiate_devices(&SessionConfig::default()).unwrap();
        assert_ne!(
            first[0].attributes().incarnation,
            second[0].attributes().incarnation
        );
    }

    #[test]
    fn test_device_count_bounds() {
        let mut config = SessionConfig::default();
        config.cpu_device_count = 0;
        assert!(instantiate_devices(&config).is_err());
        config.cpu_device_count = MAX_DEVICES + 1;
        assert!(instantiate_devices(&config).is_err());
        config.cpu_device_count = 3;
        assert_eq!(instantiate_devices(&config).unwrap().len(), 3);
    }

    #[test]
    fn test_attributes_round_trip_json() {
        let devices = instantiate_devices(&SessionConfig::default()).unwrap();
        let bytes = serde_json::to_vec(devices[0].attributes()).unwrap();
        let decoded: DeviceAttributes = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(&decoded, devices[0].attributes());
    }
}
