use std::sync::Arc;

use tokio::sync::RwLock;

use flowdeck_config::{ConfigLoader, GraphSyncEngine};
use flowdeck_core::config::ProjectConfig;
use flowdeck_core::event::EventBus;
use flowdeck_core::types::Node;
use flowdeck_engine::ExecutionEngine;

/// Shared application state for axum handlers.
pub struct AppState {
    pub project: ProjectConfig,
    pub bus: Arc<EventBus>,
    pub engine: Arc<ExecutionEngine>,
    /// The live in-memory graph, reconciled against disk on `graph.load`.
    pub graph: RwLock<Vec<Node>>,
}

impl AppState {
    pub fn new(project: ProjectConfig, bus: Arc<EventBus>, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            project,
            bus,
            engine,
            graph: RwLock::new(Vec::new()),
        }
    }

    pub fn sync_engine(&self) -> GraphSyncEngine {
        GraphSyncEngine::new(self.project.clone())
    }

    pub fn loader(&self) -> ConfigLoader {
        ConfigLoader::new(self.project.clone())
    }
}
