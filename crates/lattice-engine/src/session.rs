//! Execution sessions
//!
//! A [`Session`] binds to exactly one graph and evaluates requested outputs
//! against it. Sessions see the graph as it was when they were created or
//! last extended; nodes added afterwards become visible only through
//! [`Session::extend`].

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::graph::{Endpoint, Graph, OpKind};
use crate::tensor::Tensor;

/// Options applied once at session creation
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Execution endpoint; `None` runs in-process
    pub target: Option<String>,
    pub config: SessionConfig,
}

/// Per-run options decoded from opaque bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    /// Emit a debug trace line per evaluated node
    pub trace: bool,
    /// Advisory time budget; the engine records it but does not enforce it
    pub timeout_ms: u64,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            trace: false,
            timeout_ms: 0,
        }
    }
}

impl RunOptions {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidArgument(format!("could not parse run options: {}", e)))
    }
}

/// Diagnostic record of one run, serialized for the caller on request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunMetadata {
    /// 1-based index of the run within its session
    pub step: u64,
    pub num_feeds: usize,
    pub num_fetches: usize,
    pub num_targets: usize,
    /// Names of the nodes evaluated, in evaluation order
    pub nodes_evaluated: Vec<String>,
}

/// Result of one run call
#[derive(Debug)]
pub struct RunOutcome {
    /// One tensor per requested fetch, in request order
    pub outputs: Vec<Tensor>,
    /// Serialized [`RunMetadata`], present only when capture was requested
    pub metadata: Option<Vec<u8>>,
}

/// A live execution context bound to one graph
#[derive(Debug)]
pub struct Session {
    graph: Arc<Mutex<Graph>>,
    options: SessionOptions,
    /// Compatibility toggle: when set, every run implicitly extends first.
    /// Callers that extend explicitly turn this off.
    extend_before_run: bool,
    /// Number of graph nodes visible to this session
    synced_nodes: usize,
    closed: bool,
    runs_started: u64,
    runs_completed: u64,
}

impl Session {
    /// Create a session bound to `graph` with the given options
    ///
    /// The graph must be structurally valid; the session becomes aware of
    /// all nodes present at creation time.
    pub fn new(graph: Arc<Mutex<Graph>>, options: SessionOptions) -> Result<Self> {
        let synced_nodes = {
            let graph = graph.lock();
            graph.validate()?;
            graph.node_count()
        };
        tracing::debug!(
            nodes = synced_nodes,
            target = options.target.as_deref().unwrap_or(""),
            "session_created"
        );
        Ok(Self {
            graph,
            options,
            extend_before_run: true,
            synced_nodes,
            closed: false,
            runs_started: 0,
            runs_completed: 0,
        })
    }

    pub fn set_extend_before_run(&mut self, value: bool) {
        self.extend_before_run = value;
    }

    /// Execution endpoint configured at creation, if any
    pub fn target(&self) -> Option<&str> {
        self.options.target.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.options.config
    }

    /// Number of run calls that reached the engine, successful or not
    pub fn runs_started(&self) -> u64 {
        self.runs_started
    }

    /// Number of run calls that completed successfully
    pub fn runs_completed(&self) -> u64 {
        self.runs_completed
    }

    /// Make nodes added since creation (or the last extend) visible
    pub fn extend(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        let graph = self.graph.lock();
        graph.validate()?;
        self.synced_nodes = graph.node_count();
        Ok(())
    }

    /// Request graceful shutdown; further runs and extends fail
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::SessionClosed);
        }
        self.closed = true;
        tracing::debug!(runs = self.runs_completed, "session_closed");
        Ok(())
    }

    /// Evaluate `fetches` with `feeds` overriding the named endpoints and
    /// `targets` forced to run for their effects.
    ///
    /// Feeds transfer in by value; fetched outputs transfer out. Metadata
    /// bytes are produced only when `want_metadata` is set.
    pub fn run(
        &mut self,
        options_bytes: Option<&[u8]>,
        feeds: Vec<(Endpoint, Tensor)>,
        fetches: &[Endpoint],
        targets: &[usize],
        want_metadata: bool,
    ) -> Result<RunOutcome> {
        self.runs_started += 1;
        if self.closed {
            return Err(Error::SessionClosed);
        }
        if self.extend_before_run {
            self.extend()?;
        }

        let run_options = match options_bytes {
            Some(bytes) if !bytes.is_empty() => RunOptions::from_bytes(bytes)?,
            _ => RunOptions::default(),
        };

        let graph = Arc::clone(&self.graph);
        let graph = graph.lock();

        // Every referenced node must be inside the synced window; a node
        // added after the last extend is invisible to this session.
        for (endpoint, _) in &feeds {
            self.check_visible(&graph, *endpoint)?;
        }
        for endpoint in fetches {
            self.check_visible(&graph, *endpoint)?;
        }
        for &target in targets {
            let node = graph.node(target)?;
            if target >= self.synced_nodes {
                return Err(Error::FailedPrecondition(format!(
                    "operation {:?} was added after the last extend",
                    node.name
                )));
            }
        }

        let feed_map: HashMap<Endpoint, Tensor> = feeds.into_iter().collect();
        let mut evaluator = Evaluator {
            graph: &graph,
            feeds: &feed_map,
            cache: HashMap::new(),
            in_progress: vec![false; self.synced_nodes],
            evaluated: Vec::new(),
            trace: run_options.trace,
        };

        let mut outputs = Vec::with_capacity(fetches.len());
        for endpoint in fetches {
            outputs.push(evaluator.evaluate(*endpoint)?);
        }
        for &target in targets {
            evaluator.run_target(target)?;
        }

        self.runs_completed += 1;
        let metadata = if want_metadata {
            let metadata = RunMetadata {
                step: self.runs_completed,
                num_feeds: feed_map.len(),
                num_fetches: fetches.len(),
                num_targets: targets.len(),
                nodes_evaluated: evaluator.evaluated,
            };
            Some(serde_json::to_vec(&metadata).map_err(|e| Error::Internal(e.to_string()))?)
        } else {
            None
        };

        tracing::debug!(
            step = self.runs_completed,
            fetches = fetches.len(),
            targets = targets.len(),
            "session_run_completed"
        );
        Ok(RunOutcome { outputs, metadata })
    }

    fn check_visible(&self, graph: &Graph, endpoint: Endpoint) -> Result<()> {
        graph.check_endpoint(endpoint)?;
        if endpoint.node >= self.synced_nodes {
            let node = graph.node(endpoint.node)?;
            return Err(Error::FailedPrecondition(format!(
                "operation {:?} was added after the last extend",
                node.name
            )));
        }
        Ok(())
    }
}

/// Memoized single-run evaluator
struct Evaluator<'a> {
    graph: &'a Graph,
    feeds: &'a HashMap<Endpoint, Tensor>,
    cache: HashMap<Endpoint, Tensor>,
    in_progress: Vec<bool>,
    evaluated: Vec<String>,
    trace: bool,
}

impl Evaluator<'_> {
    fn evaluate(&mut self, endpoint: Endpoint) -> Result<Tensor> {
        if let Some(fed) = self.feeds.get(&endpoint) {
            return Ok(fed.clone());
        }
        if let Some(cached) = self.cache.get(&endpoint) {
            return Ok(cached.clone());
        }

        let node = self.graph.node(endpoint.node)?;
        if self.in_progress[endpoint.node] {
            return Err(Error::FailedPrecondition(format!(
                "operation {:?} participates in a cycle",
                node.name
            )));
        }
        self.in_progress[endpoint.node] = true;
        let result = self.evaluate_node(endpoint);
        self.in_progress[endpoint.node] = false;

        let value = result?;
        self.mark_evaluated(endpoint.node);
        self.cache.insert(endpoint, value.clone());
        Ok(value)
    }

    fn evaluate_node(&mut self, endpoint: Endpoint) -> Result<Tensor> {
        let node = self.graph.node(endpoint.node)?;
        let inputs = node.inputs.clone();
        match &node.kind {
            OpKind::Placeholder => Err(Error::InvalidArgument(format!(
                "placeholder {:?} must be fed",
                node.name
            ))),
            OpKind::Const(value) => Ok(value.clone()),
            OpKind::Identity => self.evaluate(inputs[0]),
            OpKind::Add => {
                let lhs = self.evaluate(inputs[0])?;
                let rhs = self.evaluate(inputs[1])?;
                add_tensors(&lhs, &rhs)
            }
            OpKind::NoOp => Err(Error::InvalidArgument(format!(
                "operation {:?} produces no outputs",
                node.name
            ))),
        }
    }

    /// Run a node for its effects; dependencies are evaluated, no value is
    /// produced.
    fn run_target(&mut self, index: usize) -> Result<()> {
        let node = self.graph.node(index)?;
        if node.kind.output_arity() > 0 {
            self.evaluate(Endpoint::new(index, 0))?;
            return Ok(());
        }
        let inputs = node.inputs.clone();
        for input in inputs {
            self.evaluate(input)?;
        }
        self.mark_evaluated(index);
        Ok(())
    }

    fn mark_evaluated(&mut self, index: usize) {
        if let Ok(node) = self.graph.node(index) {
            if self.trace {
                tracing::debug!(operation = node.name.as_str(), "node_evaluated");
            }
            if !self.evaluated.iter().any(|n| n == &node.name) {
                self.evaluated.push(node.name.clone());
            }
        }
    }
}

fn add_tensors(lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
    if lhs.dtype() != rhs.dtype() {
        return Err(Error::InvalidArgument(format!(
            "add requires matching dtypes, found {} and {}",
            lhs.dtype().name(),
            rhs.dtype().name()
        )));
    }
    if lhs.shape() != rhs.shape() {
        return Err(Error::InvalidArgument(format!(
            "add requires matching shapes, found {:?} and {:?}",
            lhs.shape(),
            rhs.shape()
        )));
    }
    match lhs.dtype() {
        crate::tensor::DType::F32 => {
            let sums: Vec<f32> = lhs
                .to_f32_vec()?
                .iter()
                .zip(rhs.to_f32_vec()?)
                .map(|(a, b)| a + b)
                .collect();
            Tensor::from_f32(lhs.shape().to_vec(), &sums)
        }
        crate::tensor::DType::I32 => {
            let sums: Vec<i32> = lhs
                .to_i32_vec()?
                .iter()
                .zip(rhs.to_i32_vec()?)
                .map(|(a, b)| a.wrapping_add(b))
                .collect();
            Tensor::from_i32(lhs.shape().to_vec(), &sums)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared_graph() -> Arc<Mutex<Graph>> {
        Arc::new(Mutex::new(Graph::new()))
    }

    #[test]
    fn test_const_fetch() {
        let graph = shared_graph();
        let c = graph
            .lock()
            .add_operation(
                "c",
                OpKind::Const(Tensor::from_f32(vec![2], &[1.5, 2.5]).unwrap()),
                vec![],
            )
            .unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let outcome = session
            .run(None, vec![], &[Endpoint::new(c, 0)], &[], false)
            .unwrap();
        assert_eq!(outcome.outputs[0].to_f32_vec().unwrap(), vec![1.5, 2.5]);
        assert!(outcome.metadata.is_none());
    }

    #[test]
    fn test_feed_and_add() {
        let graph = shared_graph();
        let (x, y, sum) = {
            let mut g = graph.lock();
            let x = g.add_operation("x", OpKind::Placeholder, vec![]).unwrap();
            let y = g.add_operation("y", OpKind::Placeholder, vec![]).unwrap();
            let sum = g
                .add_operation("sum", OpKind::Add, vec![Endpoint::new(x, 0), Endpoint::new(y, 0)])
                .unwrap();
            (x, y, sum)
        };
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let feeds = vec![
            (Endpoint::new(x, 0), Tensor::from_f32(vec![2], &[1.0, 2.0]).unwrap()),
            (Endpoint::new(y, 0), Tensor::from_f32(vec![2], &[10.0, 20.0]).unwrap()),
        ];
        let outcome = session
            .run(None, feeds, &[Endpoint::new(sum, 0)], &[], false)
            .unwrap();
        assert_eq!(outcome.outputs[0].to_f32_vec().unwrap(), vec![11.0, 22.0]);
    }

    #[test]
    fn test_unfed_placeholder_fails() {
        let graph = shared_graph();
        let x = graph
            .lock()
            .add_operation("x", OpKind::Placeholder, vec![])
            .unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let err = session
            .run(None, vec![], &[Endpoint::new(x, 0)], &[], false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_targets_only_run() {
        let graph = shared_graph();
        let noop = graph.lock().add_operation("nothing", OpKind::NoOp, vec![]).unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let outcome = session.run(None, vec![], &[], &[noop], false).unwrap();
        assert!(outcome.outputs.is_empty());
        assert_eq!(session.runs_completed(), 1);
    }

    #[test]
    fn test_metadata_capture() {
        let graph = shared_graph();
        let c = graph
            .lock()
            .add_operation(
                "c",
                OpKind::Const(Tensor::from_i32(vec![1], &[7]).unwrap()),
                vec![],
            )
            .unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let outcome = session
            .run(None, vec![], &[Endpoint::new(c, 0)], &[], true)
            .unwrap();
        let metadata: RunMetadata = serde_json::from_slice(outcome.metadata.as_ref().unwrap()).unwrap();
        assert_eq!(metadata.step, 1);
        assert_eq!(metadata.num_fetches, 1);
        assert_eq!(metadata.nodes_evaluated, vec!["c".to_string()]);
    }

    #[test]
    fn test_extend_makes_new_nodes_visible() {
        let graph = shared_graph();
        let mut session = Session::new(Arc::clone(&graph), SessionOptions::default()).unwrap();
        session.set_extend_before_run(false);

        let c = graph
            .lock()
            .add_operation(
                "late",
                OpKind::Const(Tensor::from_f32(vec![1], &[3.0]).unwrap()),
                vec![],
            )
            .unwrap();

        let err = session
            .run(None, vec![], &[Endpoint::new(c, 0)], &[], false)
            .unwrap_err();
        assert!(matches!(err, Error::FailedPrecondition(_)));

        session.extend().unwrap();
        let outcome = session
            .run(None, vec![], &[Endpoint::new(c, 0)], &[], false)
            .unwrap();
        assert_eq!(outcome.outputs[0].to_f32_vec().unwrap(), vec![3.0]);
    }

    #[test]
    fn test_run_options_parsing() {
        let graph = shared_graph();
        let noop = graph.lock().add_operation("n", OpKind::NoOp, vec![]).unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();

        session
            .run(Some(b"{\"trace\":true}"), vec![], &[], &[noop], false)
            .unwrap();

        let err = session
            .run(Some(b"not json"), vec![], &[], &[noop], false)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        // Zero-length options mean "no options", not an empty object.
        session.run(Some(b""), vec![], &[], &[noop], false).unwrap();
    }

    #[test]
    fn test_closed_session_rejects_everything() {
        let graph = shared_graph();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        session.close().unwrap();
        assert!(matches!(session.close(), Err(Error::SessionClosed)));
        assert!(matches!(session.extend(), Err(Error::SessionClosed)));
        assert!(matches!(
            session.run(None, vec![], &[], &[], false),
            Err(Error::SessionClosed)
        ));
    }

    #[test]
    fn test_runs_started_counts_failures() {
        let graph = shared_graph();
        let x = graph
            .lock()
            .add_operation("x", OpKind::Placeholder, vec![])
            .unwrap();
        let mut session = Session::new(graph, SessionOptions::default()).unwrap();
        let _ = session.run(None, vec![], &[Endpoint::new(x, 0)], &[], false);
        assert_eq!(session.runs_started(), 1);
        assert_eq!(session.runs_completed(), 0);
    }
}
