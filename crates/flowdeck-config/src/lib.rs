//! Persistence layer for the workflow graph.
//!
//! Three layers, leaf-first: `artifact` reads and writes individual
//! front-matter documents and the shared settings file with no graph
//! knowledge; `sync` translates graph mutations into artifact operations and
//! owns the upstream/downstream reference invariant; `loader` is the inverse,
//! reconstructing graph nodes by scanning the artifact locations.

pub mod artifact;
pub mod loader;
pub mod settings;
pub mod sync;

pub use artifact::{parse_artifact, render_artifact, Artifact};
pub use loader::ConfigLoader;
pub use settings::{read_settings, write_settings, HookAction, HookEntry, Settings};
pub use sync::GraphSyncEngine;
