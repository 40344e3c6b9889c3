//! Bridge error taxonomy
//!
//! Every entry point reports failure through [`Error`]; the paired result
//! value is always a sentinel (zero handle, empty list, `None` buffer), so
//! callers must check the error channel rather than the result shape.

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Kind tag carried by a handle, used in resolution failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Graph,
    Session,
    Operation,
    Tensor,
}

impl std::fmt::Display for HandleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HandleKind::Graph => "graph",
            HandleKind::Session => "session",
            HandleKind::Operation => "operation",
            HandleKind::Tensor => "tensor",
        };
        f.write_str(name)
    }
}

/// Errors surfaced to the managed-runtime caller
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Zero, unknown, or wrong-kind handle; resolution never dereferences
    /// anything it cannot account for.
    #[error("invalid {kind} handle {handle}")]
    InvalidHandle { kind: HandleKind, handle: u64 },

    #[error("could not parse configuration: {0}")]
    ConfigParse(String),

    /// The engine rejected or could not execute a run; carries the engine
    /// message verbatim.
    #[error("run failed: {0}")]
    RunFailed(String),

    /// An engine-side descriptor could not be serialized; a defect, not a
    /// caller error.
    #[error("internal serialization error: {0}")]
    InternalSerialization(String),

    /// Engine failure on a non-run path (create, close, extend)
    #[error("engine error: {0}")]
    Engine(String),
}

impl Error {
    pub(crate) fn invalid_handle(kind: HandleKind, handle: u64) -> Self {
        Error::InvalidHandle { kind, handle }
    }

    /// Map an engine error on a lifecycle path
    pub(crate) fn from_engine(err: lattice_engine::Error) -> Self {
        match err {
            lattice_engine::Error::ConfigParse(msg) => Error::ConfigParse(msg),
            lattice_engine::Error::Internal(msg) => Error::InternalSerialization(msg),
            other => Error::Engine(other.to_string()),
        }
    }

    /// Map an engine error inside a run call; one status governs the whole
    /// run, so everything surfaces as `RunFailed`.
    pub(crate) fn from_run(err: lattice_engine::Error) -> Self {
        Error::RunFailed(err.to_string())
    }
}
