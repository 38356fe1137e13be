use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowdeckError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid slug for node '{0}': label produces an empty identifier")]
    InvalidSlug(String),

    // Graph errors
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    // Sync errors (possibly partial: one side of an edge written, the other not)
    #[error("Sync failed: {0}")]
    Sync(String),

    // Execution errors
    #[error("A run is already active")]
    RunActive,

    #[error("Executor failed for node {node}: {message}")]
    Executor { node: String, message: String },

    #[error("Run cancelled")]
    Cancelled,

    // Gateway errors
    #[error("Gateway error: {0}")]
    Gateway(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FlowdeckError>;
