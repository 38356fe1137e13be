//! The DAG execution engine.
//!
//! One run at a time: nodes are dispatched strictly in sequence in
//! topological order, each receiving the concatenation of its upstream
//! outputs. A single node failure aborts the remainder of the run.
//! Cancellation is cooperative: the flag is checked before each dispatch, an
//! in-flight node is allowed to finish.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use flowdeck_core::event::EventBus;
use flowdeck_core::types::{Edge, ExecutionResult, LogLevel, Node, RunEvent};
use flowdeck_core::{FlowdeckError, Result};

use crate::registry::ExecutorRegistry;

/// Separator between upstream outputs when concatenating a node's input.
const INPUT_SEPARATOR: &str = "\n\n---\n\n";

/// Terminal state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Failed,
    Cancelled,
}

/// Everything a finished run produced. Results are discarded when the next
/// run starts; each run accumulates a fresh set.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub status: RunStatus,
    pub results: Vec<ExecutionResult>,
}

/// Topologically schedules node execution and emits lifecycle events.
pub struct ExecutionEngine {
    bus: Arc<EventBus>,
    registry: ExecutorRegistry,
    running: AtomicBool,
    cancelled: AtomicBool,
}

impl ExecutionEngine {
    pub fn new(bus: Arc<EventBus>, registry: ExecutorRegistry) -> Self {
        Self {
            bus,
            registry,
            running: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cancellation of the active run. Cooperative: the node already
    /// dispatched finishes, no further nodes start.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        info!("Run cancellation requested");
    }

    /// Claim the engine for a run. Rejected with `RunActive` while another
    /// run is in flight; a successful claim must be followed by
    /// [`execute_reserved`](Self::execute_reserved), which releases it.
    /// Claiming before spawning lets callers reject a second run
    /// synchronously instead of discovering the conflict inside a task.
    pub fn try_reserve(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(FlowdeckError::RunActive);
        }
        self.cancelled.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Execute the graph. Rejected with `RunActive` while another run is
    /// in flight.
    pub async fn execute(&self, run_id: &str, nodes: &[Node], edges: &[Edge]) -> Result<RunSummary> {
        self.try_reserve()?;
        Ok(self.execute_reserved(run_id, nodes, edges).await)
    }

    /// Execute a graph on an engine already claimed with
    /// [`try_reserve`](Self::try_reserve).
    pub async fn execute_reserved(&self, run_id: &str, nodes: &[Node], edges: &[Edge]) -> RunSummary {
        let summary = self.run(run_id, nodes, edges).await;
        self.running.store(false, Ordering::SeqCst);
        summary
    }

    async fn run(&self, run_id: &str, nodes: &[Node], edges: &[Edge]) -> RunSummary {
        let order = kahn_order(nodes, edges);
        if order.len() < nodes.len() {
            // lenient cycle handling: nodes never dequeued are not executed
            let skipped: Vec<&str> = (0..nodes.len())
                .filter(|i| !order.contains(i))
                .map(|i| nodes[i].id.as_str())
                .collect();
            warn!(run_id = %run_id, skipped = ?skipped, "Cycle detected, skipping unreachable nodes");
            self.bus.publish(RunEvent::Log {
                level: LogLevel::Warn,
                message: format!("skipping unreachable nodes: {}", skipped.join(", ")),
                node_id: None,
            });
        }

        // upstream ids per node, in edge order
        let mut upstream: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in edges {
            upstream
                .entry(edge.target.as_str())
                .or_default()
                .push(edge.source.as_str());
        }

        let mut outputs: HashMap<&str, String> = HashMap::new();
        let mut results: Vec<ExecutionResult> = Vec::new();

        for &i in &order {
            if self.cancelled.load(Ordering::SeqCst) {
                info!(run_id = %run_id, "Run cancelled before dispatching next node");
                self.bus.publish(RunEvent::RunCancelled {
                    run_id: run_id.to_string(),
                });
                return RunSummary {
                    status: RunStatus::Cancelled,
                    results,
                };
            }

            let node = &nodes[i];
            debug!(run_id = %run_id, node_id = %node.id, kind = %node.kind, "Dispatching node");
            self.bus.publish(RunEvent::NodeStarted {
                run_id: run_id.to_string(),
                node_id: node.id.clone(),
            });

            let input = upstream
                .get(node.id.as_str())
                .map(|sources| {
                    sources
                        .iter()
                        .filter_map(|s| outputs.get(s).map(String::as_str))
                        .collect::<Vec<_>>()
                        .join(INPUT_SEPARATOR)
                })
                .unwrap_or_default();

            let outcome = match self.registry.get(node.kind) {
                Some(executor) => executor.execute(node, &input).await,
                None => Err(FlowdeckError::Executor {
                    node: node.id.clone(),
                    message: format!("no executor registered for kind '{}'", node.kind),
                }),
            };

            match outcome {
                Ok(out) => {
                    outputs.insert(node.id.as_str(), out.output.clone());
                    let result = ExecutionResult {
                        node_id: node.id.clone(),
                        success: true,
                        output: Some(out.output),
                        artifacts: out.artifacts,
                        error: None,
                    };
                    self.bus.publish(RunEvent::NodeCompleted {
                        run_id: run_id.to_string(),
                        node_id: node.id.clone(),
                        result: result.clone(),
                    });
                    results.push(result);
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(run_id = %run_id, node_id = %node.id, error = %message, "Node failed, aborting run");
                    results.push(ExecutionResult::failed(&node.id, &message));
                    self.bus.publish(RunEvent::NodeFailed {
                        run_id: run_id.to_string(),
                        node_id: node.id.clone(),
                        error: message.clone(),
                    });
                    self.bus.publish(RunEvent::RunFailed {
                        run_id: run_id.to_string(),
                        node_id: node.id.clone(),
                        error: message,
                    });
                    return RunSummary {
                        status: RunStatus::Failed,
                        results,
                    };
                }
            }
        }

        // a cancel that landed while the final node was in flight still gets
        // its cancelled terminal
        if self.cancelled.load(Ordering::SeqCst) {
            info!(run_id = %run_id, "Run cancelled while the final node was in flight");
            self.bus.publish(RunEvent::RunCancelled {
                run_id: run_id.to_string(),
            });
            return RunSummary {
                status: RunStatus::Cancelled,
                results,
            };
        }

        info!(run_id = %run_id, nodes = results.len(), "Run completed");
        self.bus.publish(RunEvent::RunCompleted {
            run_id: run_id.to_string(),
            results: results.clone(),
        });
        RunSummary {
            status: RunStatus::Completed,
            results,
        }
    }
}

/// Kahn's algorithm. A cyclic graph yields a partial order covering only the
/// acyclic prefix; callers decide what to do with the remainder.
fn kahn_order(nodes: &[Node], edges: &[Edge]) -> Vec<usize> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut in_degree = vec![0usize; nodes.len()];
    for edge in edges {
        let (Some(&s), Some(&t)) = (index.get(edge.source.as_str()), index.get(edge.target.as_str()))
        else {
            continue;
        };
        if s == t {
            continue;
        }
        children[s].push(t);
        in_degree[t] += 1;
    }

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(u) = queue.pop_front() {
        order.push(u);
        for &v in &children[u] {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push_back(v);
            }
        }
    }
    order
}
