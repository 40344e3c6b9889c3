//! Tensor values exchanged with a running session
//!
//! A [`Tensor`] is a typed, shaped byte buffer. Data is stored as raw
//! little-endian bytes so values can cross the FFI boundary without an
//! intermediate representation; typed access goes through `bytemuck`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    I32,
}

impl DType {
    /// Size of one element in bytes
    pub fn size_of(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
        }
    }

    /// Lowercase name used on the FFI surface (`"f32"`, `"i32"`)
    pub fn name(self) -> &'static str {
        match self {
            DType::F32 => "f32",
            DType::I32 => "i32",
        }
    }

    /// Parse a dtype name as produced by [`DType::name`]
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "f32" => Ok(DType::F32),
            "i32" => Ok(DType::I32),
            other => Err(Error::InvalidArgument(format!("unknown dtype {:?}", other))),
        }
    }
}

/// A typed, shaped data buffer
///
/// Ownership of a tensor transfers into a run call for feeds and out of a
/// run call for fetched outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    data: Vec<u8>,
}

impl Tensor {
    /// Create a tensor from raw bytes, validating the byte length against
    /// the shape and element type.
    pub fn new(dtype: DType, shape: Vec<usize>, data: Vec<u8>) -> Result<Self> {
        let elements: usize = shape.iter().product();
        let expected = elements * dtype.size_of();
        if data.len() != expected {
            return Err(Error::InvalidArgument(format!(
                "tensor data is {} bytes but shape {:?} of {} requires {}",
                data.len(),
                shape,
                dtype.name(),
                expected
            )));
        }
        Ok(Self { dtype, shape, data })
    }

    /// Create an `f32` tensor from a typed slice
    pub fn from_f32(shape: Vec<usize>, values: &[f32]) -> Result<Self> {
        Self::new(DType::F32, shape, bytemuck::cast_slice(values).to_vec())
    }

    /// Create an `i32` tensor from a typed slice
    pub fn from_i32(shape: Vec<usize>, values: &[i32]) -> Result<Self> {
        Self::new(DType::I32, shape, bytemuck::cast_slice(values).to_vec())
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of elements
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Raw little-endian bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Copy out the elements as `f32`
    ///
    /// The copy tolerates unaligned byte storage (`pod_collect_to_vec`),
    /// which a buffer that crossed the FFI boundary may have.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>> {
        if self.dtype != DType::F32 {
            return Err(Error::InvalidArgument(format!(
                "expected f32 tensor, found {}",
                self.dtype.name()
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }

    /// Copy out the elements as `i32`
    pub fn to_i32_vec(&self) -> Result<Vec<i32>> {
        if self.dtype != DType::I32 {
            return Err(Error::InvalidArgument(format!(
                "expected i32 tensor, found {}",
                self.dtype.name()
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(&self.data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_from_f32_round_trip() {
        let tensor = Tensor::from_f32(vec![2, 2], &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(tensor.dtype(), DType::F32);
        assert_eq!(tensor.shape(), &[2, 2]);
        assert_eq!(tensor.element_count(), 4);
        assert_eq!(tensor.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_tensor_length_mismatch_rejected() {
        let err = Tensor::new(DType::F32, vec![3], vec![0u8; 8]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_dtype_mismatch_on_read() {
        let tensor = Tensor::from_i32(vec![2], &[7, 8]).unwrap();
        assert!(tensor.to_f32_vec().is_err());
        assert_eq!(tensor.to_i32_vec().unwrap(), vec![7, 8]);
    }

    #[test]
    fn test_dtype_names() {
        assert_eq!(DType::from_name("f32").unwrap(), DType::F32);
        assert_eq!(DType::from_name("i32").unwrap(), DType::I32);
        assert!(DType::from_name("f64").is_err());
    }
}
