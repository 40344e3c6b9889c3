//! # Lattice FFI
//!
//! Handle-mediated bridge between a managed-runtime caller and the lattice
//! computation-graph engine.
//!
//! ## Architecture
//!
//! The bridge uses handle-based object management to safely expose engine
//! objects across the language boundary:
//!
//! - **Graph** - computation graph under construction (u64 handle)
//! - **Operation** - one node of a graph (u64 handle)
//! - **Session** - live execution context bound to one graph (u64 handle)
//! - **Tensor** - typed, shaped data buffer (u64 handle)
//!
//! Handles are opaque integers resolved through kind-tagged registries;
//! resolution is a checked lookup, never a cast. Every entry point
//! validates its handles before the engine is invoked, and every ephemeral
//! resource acquired within a call is released on all exit paths.
//!
//! The caller is responsible for serializing lifecycle calls (close,
//! delete, extend) against in-flight runs on the same session handle; the
//! bridge adds no cross-call ordering of its own.

mod c_api; // C-compatible API for direct linkage
mod devices;
mod error;
mod graph;
mod handles;
mod session;
mod tensor;

pub use c_api::{
    lattice_buffer_free, lattice_clear_last_error, lattice_graph_add_operation,
    lattice_graph_delete, lattice_graph_new, lattice_last_error_length,
    lattice_last_error_message, lattice_list_devices, lattice_session_close,
    lattice_session_delete, lattice_session_extend, lattice_session_new, lattice_session_run,
    lattice_tensor_delete, lattice_tensor_new, LATTICE_ERR_BAD_ARGUMENT, LATTICE_ERR_CONFIG_PARSE,
    LATTICE_ERR_ENGINE, LATTICE_ERR_INTERNAL, LATTICE_ERR_INVALID_HANDLE, LATTICE_ERR_RUN_FAILED,
    LATTICE_OK,
};
pub use devices::list_devices;
pub use error::{Error, HandleKind, Result};
pub use graph::{graph_add_operation, graph_create, graph_delete, operation_output_count};
pub use handles::clear_all_registries;
pub use session::{session_close, session_create, session_delete, session_extend, session_run};
pub use tensor::{tensor_create, tensor_data, tensor_delete, tensor_dtype, tensor_shape};

/// Get the version of the lattice-ffi library
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
