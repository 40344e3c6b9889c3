//! Computation graph structure
//!
//! A [`Graph`] is an append-only list of named nodes. Sessions bind to a
//! graph at creation time and pick up later additions through an explicit
//! extend call, so nodes are never removed or reordered.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// One output slot of a graph node: `(node index, output index)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub node: usize,
    pub output: usize,
}

impl Endpoint {
    pub fn new(node: usize, output: usize) -> Self {
        Self { node, output }
    }
}

/// Structural operation kinds understood by the engine
///
/// Numeric kernels beyond element-wise `Add` are out of scope; these kinds
/// exist to give sessions real data flow to execute.
#[derive(Debug, Clone)]
pub enum OpKind {
    /// Produces the tensor fed for it in the current run
    Placeholder,
    /// Produces a fixed tensor baked into the graph
    Const(Tensor),
    /// Passes its single input through unchanged
    Identity,
    /// Element-wise addition of two tensors of equal dtype and shape
    Add,
    /// Produces nothing; useful as a pure run target
    NoOp,
}

impl OpKind {
    /// Parse the lowercase kind name used on the FFI surface
    pub fn from_name(name: &str, const_value: Option<Tensor>) -> Result<Self> {
        match name {
            "placeholder" => Ok(OpKind::Placeholder),
            "const" => {
                let value = const_value.ok_or_else(|| {
                    Error::InvalidArgument("const operation requires a tensor value".into())
                })?;
                Ok(OpKind::Const(value))
            }
            "identity" => Ok(OpKind::Identity),
            "add" => Ok(OpKind::Add),
            "noop" => Ok(OpKind::NoOp),
            other => Err(Error::InvalidArgument(format!(
                "unknown operation kind {:?}",
                other
            ))),
        }
    }

    /// Number of data inputs the kind requires, or `None` when any number
    /// is accepted (`NoOp` treats inputs as run-ordering dependencies).
    fn input_arity(&self) -> Option<usize> {
        match self {
            OpKind::Placeholder | OpKind::Const(_) => Some(0),
            OpKind::Identity => Some(1),
            OpKind::Add => Some(2),
            OpKind::NoOp => None,
        }
    }

    /// Number of output slots the kind produces
    pub fn output_arity(&self) -> usize {
        match self {
            OpKind::NoOp => 0,
            _ => 1,
        }
    }
}

/// A named node with its input endpoints
#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub kind: OpKind,
    pub inputs: Vec<Endpoint>,
}

/// Append-only computation graph
#[derive(Debug, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    names: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, validating the name and every input endpoint against
    /// the nodes already present. Returns the new node's index.
    pub fn add_operation(&mut self, name: &str, kind: OpKind, inputs: Vec<Endpoint>) -> Result<usize> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("operation name must not be empty".into()));
        }
        if self.names.contains_key(name) {
            return Err(Error::InvalidArgument(format!(
                "operation name {:?} already exists",
                name
            )));
        }
        if let Some(arity) = kind.input_arity() {
            if inputs.len() != arity {
                return Err(Error::InvalidArgument(format!(
                    "operation {:?} takes {} inputs, {} given",
                    name,
                    arity,
                    inputs.len()
                )));
            }
        }
        for endpoint in &inputs {
            self.check_endpoint(*endpoint)?;
        }

        let index = self.nodes.len();
        self.nodes.push(Node {
            name: name.to_string(),
            kind,
            inputs,
        });
        self.names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Validate that an endpoint references an existing output slot
    pub fn check_endpoint(&self, endpoint: Endpoint) -> Result<()> {
        let node = self.node(endpoint.node)?;
        if endpoint.output >= node.kind.output_arity() {
            return Err(Error::InvalidArgument(format!(
                "operation {:?} has no output {}",
                node.name, endpoint.output
            )));
        }
        Ok(())
    }

    pub fn node(&self, index: usize) -> Result<&Node> {
        self.nodes
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("no operation at index {}", index)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    /// Structural validation of the whole graph
    ///
    /// Nodes are validated on insert, so this re-checks the invariants that
    /// an extend call must guarantee before a session syncs to the graph.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            for endpoint in &node.inputs {
                if endpoint.node >= index {
                    return Err(Error::FailedPrecondition(format!(
                        "operation {:?} references a later operation",
                        node.name
                    )));
                }
                self.check_endpoint(*endpoint)?;
            }
        }
        Ok(())
    }
}
