//! Graph handle endpoints
//!
//! Provides the caller-side surface for building graphs that sessions bind
//! to. Operations are returned as handles so later calls can reference
//! them in feeds, fetches and targets.

use std::sync::Arc;

use parking_lot::Mutex;

use lattice_engine::{Endpoint, Graph, OpKind};

use crate::error::{Error, HandleKind, Result};
use crate::handles::{
    next_handle, peek_tensor, resolve_graph, resolve_operation, take_tensor, OperationRef,
    GRAPH_REGISTRY, OPERATION_REGISTRY,
};

/// Create an empty graph
///
/// # Returns
///
/// Handle to the created graph
pub fn graph_create() -> u64 {
    let handle = next_handle();
    GRAPH_REGISTRY
        .lock()
        .insert(handle, Arc::new(Mutex::new(Graph::new())));
    tracing::info!(graph_handle = handle, "graph_created");
    handle
}

/// Release a graph
///
/// Operations registered against the graph become stale; resolving them
/// afterwards fails rather than reaching freed state.
pub fn graph_delete(graph_handle: u64) -> Result<()> {
    if GRAPH_REGISTRY.lock().remove(&graph_handle).is_none() {
        return Err(Error::invalid_handle(HandleKind::Graph, graph_handle));
    }
    OPERATION_REGISTRY
        .lock()
        .retain(|_, op| op.graph_handle != graph_handle);
    tracing::info!(graph_handle = graph_handle, "graph_deleted");
    Ok(())
}

/// Append an operation to a graph
///
/// # Arguments
///
/// * `graph_handle` - Graph to append to
/// * `op_type` - Kind name: `"placeholder"`, `"const"`, `"identity"`,
///   `"add"` or `"noop"`
/// * `name` - Node name, unique within the graph
/// * `input_op_handles` / `input_op_indices` - Parallel arrays naming the
///   input endpoints
/// * `const_tensor_handle` - Value for a `"const"` node (0 otherwise);
///   ownership of the tensor transfers into the graph
///
/// # Returns
///
/// Handle to the new operation
pub fn graph_add_operation(
    graph_handle: u64,
    op_type: &str,
    name: &str,
    input_op_handles: &[u64],
    input_op_indices: &[u32],
    const_tensor_handle: u64,
) -> Result<u64> {
    if input_op_handles.len() != input_op_indices.len() {
        return Err(Error::Engine(format!(
            "input arrays disagree on length: {} handles, {} indices",
            input_op_handles.len(),
            input_op_indices.len()
        )));
    }
    let graph = resolve_graph(graph_handle)?;

    // Resolve the whole input array before mutating anything.
    let mut inputs = Vec::with_capacity(input_op_handles.len());
    for (&op_handle, &output) in input_op_handles.iter().zip(input_op_indices) {
        let op = resolve_operation(op_handle)?;
        if op.graph_handle != graph_handle {
            return Err(Error::invalid_handle(HandleKind::Operation, op_handle));
        }
        inputs.push(Endpoint::new(op.node, output as usize));
    }

    // Build the kind from a copy of the const value so a rejected insert
    // leaves the caller's tensor registered; the original is only taken
    // once the operation is in the graph.
    let const_value = if const_tensor_handle != 0 {
        Some(peek_tensor(const_tensor_handle)?)
    } else {
        None
    };
    let kind = OpKind::from_name(op_type, const_value).map_err(Error::from_engine)?;

    let node = graph
        .lock()
        .add_operation(name, kind, inputs)
        .map_err(Error::from_engine)?;

    if const_tensor_handle != 0 && take_tensor(const_tensor_handle).is_err() {
        // Another caller removed the tensor between the copy and the take;
        // the graph already owns its value, so only note the disappearance.
        tracing::warn!(
            tensor_handle = const_tensor_handle,
            "const tensor vanished while the operation was being added"
        );
    }

    let handle = next_handle();
    OPERATION_REGISTRY
        .lock()
        .insert(handle, OperationRef { graph_handle, node });
    tracing::debug!(
        graph_handle = graph_handle,
        operation_handle = handle,
        name = name,
        "operation_added"
    );
    Ok(handle)
}

/// Number of output slots an operation exposes
pub fn operation_output_count(operation_handle: u64) -> Result<u32> {
    let op = resolve_operation(operation_handle)?;
    let graph = resolve_graph(op.graph_handle)?;
    let graph = graph.lock();
    let node = graph.node(op.node).map_err(Error::from_engine)?;
    Ok(node.kind.output_arity() as u32)
}
