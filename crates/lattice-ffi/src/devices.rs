//! Device enumeration
//!
//! Discovery-only: devices are instantiated under the supplied
//! configuration, their attributes serialized, and the set torn down
//! before returning. No live session is touched.

use lattice_engine::{instantiate_devices, SessionConfig};

use crate::error::{Error, Result};

/// Enumerate the devices a configuration would provide
///
/// # Arguments
///
/// * `config_bytes` - Optional serialized configuration; parse failure
///   aborts before any device is instantiated
///
/// # Returns
///
/// One serialized device-descriptor byte sequence per device. Never a
/// partial list: any instantiation or serialization failure clears the
/// result and surfaces the error instead.
pub fn list_devices(config_bytes: Option<&[u8]>) -> Result<Vec<Vec<u8>>> {
    let config = match config_bytes {
        Some(bytes) if !bytes.is_empty() => {
            SessionConfig::from_bytes(bytes).map_err(Error::from_engine)?
        }
        _ => SessionConfig::default(),
    };

    let devices = instantiate_devices(&config).map_err(Error::from_engine)?;

    let mut descriptors = Vec::with_capacity(devices.len());
    for device in &devices {
        let bytes = serde_json::to_vec(device.attributes())
            .map_err(|e| Error::InternalSerialization(e.to_string()))?;
        descriptors.push(bytes);
    }

    tracing::debug!(count = descriptors.len(), "devices_listed");
    Ok(descriptors)
}
