//! Handle registries
//!
//! The caller's runtime cannot hold native references, so every live object
//! is filed under an opaque `u64` handle in a kind-specific registry.
//! Resolution is a checked lookup: zero, unknown and wrong-kind handles
//! fail with [`Error::InvalidHandle`] without touching any state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use lattice_engine::{Graph, Session, Tensor};

use crate::error::{Error, HandleKind, Result};

/// Registered operation: the graph it belongs to plus its node index
#[derive(Debug, Clone, Copy)]
pub struct OperationRef {
    pub graph_handle: u64,
    pub node: usize,
}

/// A session entry remembers the graph handle it was created against so
/// run requests can reject operations from a different graph.
#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub session: Arc<Mutex<Session>>,
    pub graph_handle: u64,
}

pub static GRAPH_REGISTRY: Lazy<Mutex<HashMap<u64, Arc<Mutex<Graph>>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub static SESSION_REGISTRY: Lazy<Mutex<HashMap<u64, SessionEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub static OPERATION_REGISTRY: Lazy<Mutex<HashMap<u64, OperationRef>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

pub static TENSOR_REGISTRY: Lazy<Mutex<HashMap<u64, Tensor>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh handle; 0 is reserved as the invalid handle
pub fn next_handle() -> u64 {
    NEXT_HANDLE.fetch_add(1, Ordering::Relaxed)
}

/// Resolve a graph handle to its shared graph
pub fn resolve_graph(handle: u64) -> Result<Arc<Mutex<Graph>>> {
    GRAPH_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or_else(|| Error::invalid_handle(HandleKind::Graph, handle))
}

/// Resolve a session handle to its registry entry
pub fn resolve_session(handle: u64) -> Result<SessionEntry> {
    SESSION_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or_else(|| Error::invalid_handle(HandleKind::Session, handle))
}

/// Resolve an operation handle to its graph binding
pub fn resolve_operation(handle: u64) -> Result<OperationRef> {
    OPERATION_REGISTRY
        .lock()
        .get(&handle)
        .copied()
        .ok_or_else(|| Error::invalid_handle(HandleKind::Operation, handle))
}

/// Check that a tensor handle is registered, without taking the tensor
pub fn check_tensor(handle: u64) -> Result<()> {
    if TENSOR_REGISTRY.lock().contains_key(&handle) {
        Ok(())
    } else {
        Err(Error::invalid_handle(HandleKind::Tensor, handle))
    }
}

/// Copy a tensor out of the registry, leaving the entry in place
pub fn peek_tensor(handle: u64) -> Result<Tensor> {
    TENSOR_REGISTRY
        .lock()
        .get(&handle)
        .cloned()
        .ok_or_else(|| Error::invalid_handle(HandleKind::Tensor, handle))
}

/// Remove a tensor from the registry, transferring ownership to the caller
pub fn take_tensor(handle: u64) -> Result<Tensor> {
    TENSOR_REGISTRY
        .lock()
        .remove(&handle)
        .ok_or_else(|| Error::invalid_handle(HandleKind::Tensor, handle))
}

/// Take a whole array of tensors in one registry transaction
///
/// Either every handle resolves and every tensor transfers out, or nothing
/// is removed. A handle listed twice is rejected: its second use would be
/// consuming an already-consumed value.
pub fn take_tensors(handles: &[u64]) -> Result<Vec<Tensor>> {
    let mut registry = TENSOR_REGISTRY.lock();
    let mut taken: Vec<(u64, Tensor)> = Vec::with_capacity(handles.len());
    for &handle in handles {
        match registry.remove(&handle) {
            Some(tensor) => taken.push((handle, tensor)),
            None => {
                // Unknown handle, or a duplicate already consumed above;
                // put everything back before failing.
                for (restored, tensor) in taken {
                    registry.insert(restored, tensor);
                }
                return Err(Error::invalid_handle(HandleKind::Tensor, handle));
            }
        }
    }
    Ok(taken.into_iter().map(|(_, tensor)| tensor).collect())
}

/// Register a tensor and return its new handle
pub fn register_tensor(tensor: Tensor) -> u64 {
    let handle = next_handle();
    TENSOR_REGISTRY.lock().insert(handle, tensor);
    handle
}

/// Clear every registry (test isolation)
pub fn clear_all_registries() {
    GRAPH_REGISTRY.lock().clear();
    SESSION_REGISTRY.lock().clear();
    OPERATION_REGISTRY.lock().clear();
    TENSOR_REGISTRY.lock().clear();
    tracing::debug!("registries_cleared");
}
