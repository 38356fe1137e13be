use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use flowdeck_config::loader::derive_edges;
use flowdeck_config::ConfigLoader;
use flowdeck_core::types::{Edge, Node, NodeKind, RunEvent, RunId};
use flowdeck_engine::layout;

use crate::protocol::{
    ClientFrame, GraphSyncParams, NodeDeleteParams, RunCancelParams, RunStartParams, ServerEvent,
    ServerResponse,
};
use crate::state::AppState;

/// Handle a single WebSocket connection (axum WebSocket).
pub async fn handle_connection(ws: WebSocket, state: Arc<AppState>) {
    let (ws_tx, mut ws_rx) = ws.split();
    let ws_tx = Arc::new(Mutex::new(ws_tx));

    // Subscribe to the event bus and forward run events
    let mut event_rx = state.bus.subscribe();
    let event_ws_tx = ws_tx.clone();
    let event_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let frame = ServerEvent::new(event);
            let Ok(text) = serde_json::to_string(&frame) else {
                continue;
            };
            let mut tx = event_ws_tx.lock().await;
            if tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed client frame");
                continue;
            }
        };
        debug!(id = %frame.id, method = %frame.method, "Client frame");

        let response = dispatch(frame, &state).await;
        if let Ok(text) = serde_json::to_string(&response) {
            let mut tx = ws_tx.lock().await;
            if tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    }

    event_task.abort();
    debug!("Connection closed");
}

async fn dispatch(frame: ClientFrame, state: &Arc<AppState>) -> ServerResponse {
    match frame.method.as_str() {
        "run.start" => run_start(frame.id, frame.params, state).await,
        "run.cancel" => run_cancel(frame.id, frame.params, state),
        "graph.load" => graph_load(frame.id, state).await,
        "graph.sync" => graph_sync(frame.id, frame.params, state).await,
        "node.delete" => node_delete(frame.id, frame.params, state).await,
        other => ServerResponse::err(frame.id, -32601, format!("unknown method '{}'", other)),
    }
}

async fn run_start(id: String, params: serde_json::Value, state: &Arc<AppState>) -> ServerResponse {
    let params: RunStartParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return ServerResponse::err(id, -32602, format!("invalid params: {}", e)),
    };
    // reserve before spawning so a losing concurrent start gets the 409
    // instead of a success response for a run that never executes
    if let Err(e) = state.engine.try_reserve() {
        return ServerResponse::err(id, 409, e.to_string());
    }

    let run_id = params.run_id.unwrap_or_else(|| RunId::new().to_string());
    info!(run_id = %run_id, nodes = params.nodes.len(), "Starting run");

    let engine = state.engine.clone();
    let spawned_run_id = run_id.clone();
    tokio::spawn(async move {
        let summary = engine
            .execute_reserved(&spawned_run_id, &params.nodes, &params.edges)
            .await;
        debug!(run_id = %spawned_run_id, status = ?summary.status, "Run finished");
    });

    ServerResponse::ok(id, serde_json::json!({ "run_id": run_id }))
}

fn run_cancel(id: String, params: serde_json::Value, state: &Arc<AppState>) -> ServerResponse {
    let params: RunCancelParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return ServerResponse::err(id, -32602, format!("invalid params: {}", e)),
    };
    if state.engine.is_running() {
        state.engine.cancel();
    } else {
        // protocol promise: a cancel is always followed by a terminal event
        state.bus.publish(RunEvent::RunCancelled {
            run_id: params.run_id,
        });
    }
    ServerResponse::ok(id, serde_json::json!({ "cancelled": true }))
}

async fn graph_load(id: String, state: &Arc<AppState>) -> ServerResponse {
    let loaded = state.loader().load();
    let mut live = state.graph.write().await;
    ConfigLoader::merge_into(&mut live, loaded);

    let edges = derive_edges(&live);
    let positions = layout(&live, &edges);
    for node in live.iter_mut() {
        if node.position.is_none() {
            node.position = positions.get(&node.id).copied();
        }
    }

    ServerResponse::ok(
        id,
        serde_json::json!({ "nodes": &*live, "edges": edges }),
    )
}

async fn graph_sync(id: String, params: serde_json::Value, state: &Arc<AppState>) -> ServerResponse {
    let params: GraphSyncParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return ServerResponse::err(id, -32602, format!("invalid params: {}", e)),
    };

    let sync = state.sync_engine();
    let mut nodes = params.nodes;
    let mut failures = Vec::new();
    let mut saved = 0usize;

    for node in &nodes {
        match sync.sync_node(node) {
            Ok(_) => saved += 1,
            Err(e) => failures.push(serde_json::json!({ "id": node.id, "error": e.to_string() })),
        }
    }
    for edge in &params.edges {
        if let Err(reason) = validate_edge(&nodes, edge) {
            failures.push(serde_json::json!({ "id": edge.id, "error": reason }));
            continue;
        }
        match sync.sync_edge(edge, &mut nodes) {
            Ok(()) => saved += 1,
            Err(e) => failures.push(serde_json::json!({ "id": edge.id, "error": e.to_string() })),
        }
    }

    *state.graph.write().await = nodes;
    ServerResponse::ok(id, serde_json::json!({ "saved": saved, "failures": failures }))
}

async fn node_delete(id: String, params: serde_json::Value, state: &Arc<AppState>) -> ServerResponse {
    let params: NodeDeleteParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => return ServerResponse::err(id, -32602, format!("invalid params: {}", e)),
    };

    let mut live = state.graph.write().await;
    if let Err(e) = state.sync_engine().delete_node(&params.node, &mut live) {
        return ServerResponse::err(id, 500, e.to_string());
    }
    live.retain(|n| n.id != params.node.id);
    ServerResponse::ok(id, serde_json::json!({ "deleted": params.node.id }))
}

/// Graph invariants, enforced here at the mutation boundary: endpoints must
/// exist, no self-loops, Input nodes take no incoming edges, Output nodes
/// take no outgoing edges.
fn validate_edge(nodes: &[Node], edge: &Edge) -> Result<(), String> {
    if edge.source == edge.target {
        return Err("self-loops are not allowed".to_string());
    }
    let source = nodes
        .iter()
        .find(|n| n.id == edge.source)
        .ok_or_else(|| format!("unknown source node '{}'", edge.source))?;
    let target = nodes
        .iter()
        .find(|n| n.id == edge.target)
        .ok_or_else(|| format!("unknown target node '{}'", edge.target))?;
    if source.kind == NodeKind::Output {
        return Err("Output nodes cannot have outgoing edges".to_string());
    }
    if target.kind == NodeKind::Input {
        return Err("Input nodes cannot have incoming edges".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::new(id, kind, id)
    }

    #[test]
    fn validate_edge_rejects_invariant_violations() {
        let nodes = vec![
            node("i1", NodeKind::Input),
            node("a1", NodeKind::Agent),
            node("o1", NodeKind::Output),
        ];

        assert!(validate_edge(&nodes, &Edge::new("e", "i1", "a1")).is_ok());
        assert!(validate_edge(&nodes, &Edge::new("e", "a1", "a1")).is_err());
        assert!(validate_edge(&nodes, &Edge::new("e", "a1", "i1")).is_err());
        assert!(validate_edge(&nodes, &Edge::new("e", "o1", "a1")).is_err());
        assert!(validate_edge(&nodes, &Edge::new("e", "a1", "missing")).is_err());
    }
}
