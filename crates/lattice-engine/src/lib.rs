//! # lattice-engine - Computation-Graph Execution Engine
//!
//! Minimal synchronous engine behind the lattice bridge. The engine owns
//! graph structure, session lifecycle and device instantiation; the bridge
//! crate (`lattice-ffi`) exposes these to a managed-runtime caller through
//! opaque integer handles.
//!
//! ## Architecture
//!
//! ```text
//! lattice-ffi (handle registries, C ABI)
//!   ↓ resolves handles into
//! lattice-engine::{Graph, Session, Tensor}
//!   ↓ evaluates
//! structural operations (placeholder/const/identity/add/noop)
//! ```
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//! use lattice_engine::{Endpoint, Graph, OpKind, Session, SessionOptions, Tensor};
//!
//! # fn main() -> lattice_engine::Result<()> {
//! let graph = Arc::new(Mutex::new(Graph::new()));
//! let c = graph.lock().add_operation(
//!     "c",
//!     OpKind::Const(Tensor::from_f32(vec![2], &[1.0, 2.0])?),
//!     vec![],
//! )?;
//!
//! let mut session = Session::new(Arc::clone(&graph), SessionOptions::default())?;
//! let outcome = session.run(None, vec![], &[Endpoint::new(c, 0)], &[], false)?;
//! assert_eq!(outcome.outputs[0].to_f32_vec()?, vec![1.0, 2.0]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod graph;
pub mod session;
pub mod tensor;

// Re-export primary types
pub use config::SessionConfig;
pub use device::{instantiate_devices, Device, DeviceAttributes};
pub use error::{Error, Result};
pub use graph::{Endpoint, Graph, Node, OpKind};
pub use session::{RunMetadata, RunOptions, RunOutcome, Session, SessionOptions};
pub use tensor::{DType, Tensor};
