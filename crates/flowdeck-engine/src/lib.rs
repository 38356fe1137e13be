//! Graph execution and layout.
//!
//! The execution engine topologically orders a node set with Kahn's
//! algorithm, dispatches each node to its kind-specific executor strictly in
//! sequence, propagates concatenated upstream output downstream, and emits
//! lifecycle events on the shared bus. The layout engine assigns
//! deterministic 2D positions to graphs that arrive without them.

pub mod executor;
pub mod layout;
pub mod registry;

pub use executor::{ExecutionEngine, RunStatus, RunSummary};
pub use layout::layout;
pub use registry::{ExecutorOutput, ExecutorRegistry, NodeExecutor};
