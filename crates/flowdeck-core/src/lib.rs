//! Core types, events, and the error hierarchy shared by all Flowdeck crates.

pub mod config;
pub mod error;
pub mod event;
pub mod slug;
pub mod types;

pub use error::{FlowdeckError, Result};
