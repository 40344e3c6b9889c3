//! Session bridge: context lifecycle and run orchestration
//!
//! Sessions are the execution contexts of the engine. This module resolves
//! caller handles into engine objects, drives create/extend/close/delete
//! with the ownership discipline the engine expects, and assembles run
//! requests out of parallel handle arrays.
//!
//! Lifecycle calls (close, delete, extend) must not race an in-flight run
//! on the same handle; serializing those is the caller's obligation. The
//! bridge itself adds no cross-call ordering.

use lattice_engine::{Endpoint, Session, SessionConfig, SessionOptions};
use parking_lot::Mutex;
use std::sync::Arc;

use crate::error::{Error, HandleKind, Result};
use crate::handles::{
    next_handle, resolve_graph, resolve_operation, resolve_session, take_tensors, register_tensor,
    SessionEntry, SESSION_REGISTRY,
};

/// Create a session bound to a graph
///
/// # Arguments
///
/// * `graph_handle` - Graph the session executes against
/// * `target` - Optional execution endpoint
/// * `config_bytes` - Optional serialized configuration; zero-length means
///   "no configuration"
///
/// # Returns
///
/// Handle to the created session
pub fn session_create(
    graph_handle: u64,
    target: Option<&str>,
    config_bytes: Option<&[u8]>,
) -> Result<u64> {
    let graph = resolve_graph(graph_handle)?;

    let config = match config_bytes {
        Some(bytes) if !bytes.is_empty() => {
            SessionConfig::from_bytes(bytes).map_err(Error::from_engine)?
        }
        _ => SessionConfig::default(),
    };
    let options = SessionOptions {
        target: target.map(str::to_string),
        config,
    };

    let mut session = Session::new(graph, options).map_err(Error::from_engine)?;
    // The bridge extends explicitly, exactly once per caller request.
    session.set_extend_before_run(false);

    let handle = next_handle();
    SESSION_REGISTRY.lock().insert(
        handle,
        SessionEntry {
            session: Arc::new(Mutex::new(session)),
            graph_handle,
        },
    );
    tracing::info!(session_handle = handle, graph_handle = graph_handle, "session_created");
    Ok(handle)
}

/// Request graceful shutdown of a session
pub fn session_close(session_handle: u64) -> Result<()> {
    let entry = resolve_session(session_handle)?;
    entry.session.lock().close().map_err(Error::from_engine)?;
    tracing::info!(session_handle = session_handle, "session_closed");
    Ok(())
}

/// Release a session's resources
///
/// Close is attempted first; a close failure is reported in the log but
/// never prevents deletion, and the caller observes success either way.
pub fn session_delete(session_handle: u64) -> Result<()> {
    let entry = SESSION_REGISTRY
        .lock()
        .remove(&session_handle)
        .ok_or_else(|| Error::invalid_handle(HandleKind::Session, session_handle))?;

    if let Err(e) = entry.session.lock().close() {
        tracing::warn!(
            session_handle = session_handle,
            error = %e,
            "close failed during delete; deleting anyway"
        );
    }
    tracing::info!(session_handle = session_handle, "session_deleted");
    Ok(())
}

/// Push graph nodes added since the last sync into the session
pub fn session_extend(session_handle: u64) -> Result<()> {
    let entry = resolve_session(session_handle)?;
    entry.session.lock().extend().map_err(Error::from_engine)?;
    tracing::debug!(session_handle = session_handle, "session_extended");
    Ok(())
}

/// Run a computation
///
/// Feeds `N` input tensors into `N` input endpoints, fetches `M` output
/// endpoints and forces `K` target operations to run. Newly allocated
/// output tensor handles are written into `output_tensor_handles`,
/// order-preserving and 1:1 with the output arrays; the caller owns them
/// and must eventually release them as tensors.
///
/// Input tensors transfer into the call: on any outcome after validation
/// passes, their handles are consumed. Validation failures leave every
/// registry unchanged and the engine uninvoked.
///
/// # Returns
///
/// Serialized run metadata when `want_metadata` is set, otherwise `None`
#[allow(clippy::too_many_arguments)]
pub fn session_run(
    session_handle: u64,
    run_options: Option<&[u8]>,
    input_tensor_handles: &[u64],
    input_op_handles: &[u64],
    input_op_indices: &[u32],
    output_op_handles: &[u64],
    output_op_indices: &[u32],
    target_op_handles: &[u64],
    want_metadata: bool,
    output_tensor_handles: &mut [u64],
) -> Result<Option<Vec<u8>>> {
    let entry = resolve_session(session_handle)?;

    if input_op_handles.len() != input_tensor_handles.len()
        || input_op_indices.len() != input_tensor_handles.len()
    {
        return Err(Error::Engine(format!(
            "input arrays disagree on length: {} tensors, {} operations, {} indices",
            input_tensor_handles.len(),
            input_op_handles.len(),
            input_op_indices.len()
        )));
    }
    if output_op_indices.len() != output_op_handles.len()
        || output_tensor_handles.len() != output_op_handles.len()
    {
        return Err(Error::Engine(format!(
            "output arrays disagree on length: {} operations, {} indices, {} handle slots",
            output_op_handles.len(),
            output_op_indices.len(),
            output_tensor_handles.len()
        )));
    }

    // Independent validation passes over each array; nothing reaches the
    // engine until every element has resolved.
    let input_endpoints = resolve_endpoints(entry.graph_handle, input_op_handles, input_op_indices)?;
    let output_endpoints = resolve_endpoints(entry.graph_handle, output_op_handles, output_op_indices)?;
    let mut targets = Vec::with_capacity(target_op_handles.len());
    for &op_handle in target_op_handles {
        targets.push(resolve_bound_operation(entry.graph_handle, op_handle)?.1);
    }

    // Ownership transfer: the whole input array moves out of the registry
    // in one transaction, after everything else has validated.
    let input_values = take_tensors(input_tensor_handles)?;
    let feeds = input_endpoints.into_iter().zip(input_values).collect();

    let outcome = entry
        .session
        .lock()
        .run(run_options, feeds, &output_endpoints, &targets, want_metadata)
        .map_err(Error::from_run)?;

    for (slot, tensor) in output_tensor_handles.iter_mut().zip(outcome.outputs) {
        *slot = register_tensor(tensor);
    }

    tracing::debug!(
        session_handle = session_handle,
        inputs = input_tensor_handles.len(),
        outputs = output_tensor_handles.len(),
        targets = target_op_handles.len(),
        "session_run_bridged"
    );
    Ok(outcome.metadata)
}

/// Resolve one operation handle, checking it belongs to the session's graph
fn resolve_bound_operation(graph_handle: u64, op_handle: u64) -> Result<(u64, usize)> {
    let op = resolve_operation(op_handle)?;
    if op.graph_handle != graph_handle {
        return Err(Error::invalid_handle(HandleKind::Operation, op_handle));
    }
    Ok((op_handle, op.node))
}

/// Resolve a parallel (handle, output index) array into engine endpoints
fn resolve_endpoints(
    graph_handle: u64,
    op_handles: &[u64],
    op_indices: &[u32],
) -> Result<Vec<Endpoint>> {
    let mut endpoints = Vec::with_capacity(op_handles.len());
    for (&op_handle, &output) in op_handles.iter().zip(op_indices) {
        let (_, node) = resolve_bound_operation(graph_handle, op_handle)?;
        endpoints.push(Endpoint::new(node, output as usize));
    }
    Ok(endpoints)
}
