//! WebSocket + HTTP gateway.
//!
//! Clients drive the graph over a frame-based WebSocket protocol: request
//! frames start or cancel runs and load or sync the graph; run lifecycle
//! events are pushed as they happen. Graph invariants (self-loops, edges
//! into Input or out of Output) are validated here, at the mutation
//! boundary, before anything reaches the sync engine.

pub mod connection;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod state;

pub use server::GatewayServer;
pub use state::AppState;
