use serde::{Deserialize, Serialize};

use flowdeck_core::types::{Edge, Node, RunEvent};

/// A frame sent from the client.
#[derive(Debug, Deserialize)]
pub struct ClientFrame {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A response frame sent to the client.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// An event frame pushed to the client.
#[derive(Debug, Serialize)]
pub struct ServerEvent {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub event: RunEvent,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: i32,
    pub message: String,
}

impl ServerResponse {
    pub fn ok(id: String, result: serde_json::Value) -> Self {
        Self {
            frame_type: "response".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: String, code: i32, message: String) -> Self {
        Self {
            frame_type: "response".to_string(),
            id,
            result: None,
            error: Some(ErrorPayload { code, message }),
        }
    }
}

impl ServerEvent {
    pub fn new(event: RunEvent) -> Self {
        Self {
            frame_type: "event".to_string(),
            event,
        }
    }
}

/// Params for `run.start`. A run id is generated when the client omits one.
#[derive(Debug, Deserialize)]
pub struct RunStartParams {
    #[serde(default)]
    pub run_id: Option<String>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Params for `run.cancel`.
#[derive(Debug, Deserialize)]
pub struct RunCancelParams {
    pub run_id: String,
}

/// Params for `node.delete`.
#[derive(Debug, Deserialize)]
pub struct NodeDeleteParams {
    pub node: Node,
}

/// Params for `graph.sync`.
#[derive(Debug, Deserialize)]
pub struct GraphSyncParams {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}
