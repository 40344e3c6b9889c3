//! Tensor handle endpoints
//!
//! Provides handle-based access to tensor values. Shapes cross the
//! boundary as JSON-encoded arrays, e.g. `"[4, 6]"` for a 4x6 matrix.

use lattice_engine::{DType, Tensor};

use crate::error::{Error, Result};
use crate::handles::{peek_tensor, register_tensor, take_tensor};

/// Create a tensor from raw little-endian bytes
///
/// # Arguments
///
/// * `dtype` - Element type name (`"f32"` or `"i32"`)
/// * `shape_json` - JSON-encoded shape array, e.g. `"[2, 3]"`
/// * `data` - Raw element bytes; length must match shape and dtype
///
/// # Returns
///
/// Handle to the created tensor
pub fn tensor_create(dtype: &str, shape_json: &str, data: &[u8]) -> Result<u64> {
    let dtype = DType::from_name(dtype).map_err(Error::from_engine)?;
    let shape: Vec<usize> = serde_json::from_str(shape_json)
        .map_err(|e| Error::Engine(format!("could not parse shape: {}", e)))?;
    let tensor = Tensor::new(dtype, shape, data.to_vec()).map_err(Error::from_engine)?;

    let handle = register_tensor(tensor);
    tracing::debug!(tensor_handle = handle, "tensor_created");
    Ok(handle)
}

/// Element type name of a tensor
pub fn tensor_dtype(tensor_handle: u64) -> Result<String> {
    Ok(peek_tensor(tensor_handle)?.dtype().name().to_string())
}

/// Tensor shape as a JSON-encoded array
pub fn tensor_shape(tensor_handle: u64) -> Result<String> {
    let tensor = peek_tensor(tensor_handle)?;
    serde_json::to_string(tensor.shape())
        .map_err(|e| Error::InternalSerialization(e.to_string()))
}

/// Raw little-endian bytes of a tensor
pub fn tensor_data(tensor_handle: u64) -> Result<Vec<u8>> {
    Ok(peek_tensor(tensor_handle)?.data().to_vec())
}

/// Release a tensor
pub fn tensor_delete(tensor_handle: u64) -> Result<()> {
    take_tensor(tensor_handle)?;
    tracing::debug!(tensor_handle = tensor_handle, "tensor_deleted");
    Ok(())
}
