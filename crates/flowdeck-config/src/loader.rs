//! Artifact → graph reconstruction, the inverse of the sync engine.

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, warn};

use flowdeck_core::config::{ProjectConfig, AGENT_EXT, SKILL_DOC};
use flowdeck_core::types::{Edge, Node, NodeFields, NodeKind};

use crate::artifact;
use crate::settings;

/// Id prefixes of nodes the loader can reconstruct from disk. Nodes carrying
/// one of these are filesystem-owned; anything else is user-authored and
/// never removed by a reload.
const FS_OWNED_PREFIXES: [&str; 3] = ["skill-", "agent-", "hook-"];

/// Scans the artifact store and reconstructs graph nodes from it.
pub struct ConfigLoader {
    project: ProjectConfig,
}

impl ConfigLoader {
    pub fn new(project: ProjectConfig) -> Self {
        Self { project }
    }

    /// Scan every artifact location and return the reconstructed nodes.
    ///
    /// A single malformed or unreadable artifact is skipped with a warning;
    /// a missing directory yields an empty list, not an error.
    pub fn load(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        nodes.extend(self.load_skills());
        nodes.extend(self.load_agents());
        nodes.extend(self.load_hooks());
        debug!(count = nodes.len(), "Reconstructed nodes from artifacts");
        nodes
    }

    /// Merge freshly loaded nodes into a live graph.
    ///
    /// Filesystem-owned nodes no longer found on disk are removed; nodes with
    /// any other id are kept untouched; newly discovered filesystem nodes are
    /// appended.
    pub fn merge_into(live: &mut Vec<Node>, loaded: Vec<Node>) {
        let loaded_ids: Vec<&str> = loaded.iter().map(|n| n.id.as_str()).collect();
        live.retain(|n| !is_fs_owned(&n.id) || loaded_ids.contains(&n.id.as_str()));
        for node in loaded {
            if !live.iter().any(|n| n.id == node.id) {
                live.push(node);
            }
        }
    }

    fn load_skills(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        for slug in sorted_entries(&self.project.skills_dir(), |p| p.is_dir()) {
            let doc_path = self.project.skills_dir().join(&slug).join(SKILL_DOC);
            if !doc_path.exists() {
                debug!(slug = %slug, "Skill directory without {}, skipping", SKILL_DOC);
                continue;
            }
            let doc = match artifact::read_artifact(&doc_path) {
                Ok(d) => d,
                Err(e) => {
                    warn!(path = %doc_path.display(), error = %e, "Failed to read skill artifact");
                    continue;
                }
            };
            let label = doc.get("name").unwrap_or(&slug).to_string();
            let mut node = Node::new(format!("skill-{}", slug), NodeKind::Skill, label);
            node.description = doc.get("description").map(String::from);
            node.fields = NodeFields {
                skill_id: Some(slug),
                upstream: doc.get_list("upstream"),
                downstream: doc.get_list("downstream"),
                body: Some(doc.body),
                ..Default::default()
            };
            nodes.push(node);
        }
        nodes
    }

    fn load_agents(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        for name in sorted_entries(&self.project.agents_dir(), |p| p.is_file()) {
            let Some(slug) = name.strip_suffix(&format!(".{}", AGENT_EXT)) else {
                continue;
            };
            let doc_path = self.project.agents_dir().join(&name);
            let doc = match artifact::read_artifact(&doc_path) {
                Ok(d) => d,
                Err(e) => {
                    warn!(path = %doc_path.display(), error = %e, "Failed to read agent artifact");
                    continue;
                }
            };
            let label = doc.get("name").unwrap_or(slug).to_string();
            let mut node = Node::new(format!("agent-{}", slug), NodeKind::Agent, label);
            node.description = doc.get("description").map(String::from);
            node.fields = NodeFields {
                tools: doc.get_list("tools"),
                model: doc.get("model").map(String::from),
                skills: doc.get_list("skills"),
                body: Some(doc.body),
                ..Default::default()
            };
            nodes.push(node);
        }
        nodes
    }

    fn load_hooks(&self) -> Vec<Node> {
        let settings = settings::read_settings(&self.project.settings_path());
        let mut nodes = Vec::new();
        for (event, entries) in &settings.hooks {
            for (index, entry) in entries.iter().enumerate() {
                let command = entry.actions.first().map(|a| a.command.clone());
                let mut node = Node::new(
                    format!("hook-{}-{}", event, index),
                    NodeKind::Hook,
                    format!("{} ({})", event, entry.matcher),
                );
                node.fields = NodeFields {
                    event: Some(event.clone()),
                    matcher: Some(entry.matcher.clone()),
                    command,
                    ..Default::default()
                };
                nodes.push(node);
            }
        }
        nodes
    }
}

/// Reconstruct data-flow edges from the reference lists the nodes carry.
///
/// Slugs are weak references: an entry that does not resolve to a live node
/// (renamed, stale artifact) is skipped, never an error. Both directions are
/// consulted so a half-synced edge still shows up once.
pub fn derive_edges(nodes: &[Node]) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut seen = HashSet::new();

    let resolve = |slug: &str, kinds: &[NodeKind]| {
        nodes
            .iter()
            .find(|n| kinds.contains(&n.kind) && n.slug() == slug)
    };
    let push = |source: &str, target: &str, seen: &mut HashSet<(String, String)>, edges: &mut Vec<Edge>| {
        if source == target {
            return;
        }
        if seen.insert((source.to_string(), target.to_string())) {
            edges.push(Edge::new(format!("e-{}-{}", source, target), source, target));
        }
    };

    for node in nodes {
        match node.kind {
            NodeKind::Agent => {
                for slug in &node.fields.skills {
                    if let Some(target) = resolve(slug, &[NodeKind::Skill]) {
                        push(&node.id, &target.id, &mut seen, &mut edges);
                    }
                }
            }
            NodeKind::Skill => {
                for slug in &node.fields.downstream {
                    if let Some(target) = resolve(slug, &[NodeKind::Skill, NodeKind::Agent]) {
                        push(&node.id, &target.id, &mut seen, &mut edges);
                    }
                }
                for slug in &node.fields.upstream {
                    if let Some(source) = resolve(slug, &[NodeKind::Skill, NodeKind::Agent]) {
                        push(&source.id, &node.id, &mut seen, &mut edges);
                    }
                }
            }
            _ => {}
        }
    }
    edges
}

fn is_fs_owned(id: &str) -> bool {
    FS_OWNED_PREFIXES.iter().any(|p| id.starts_with(p))
}

/// Directory entry names matching a predicate, sorted for determinism.
/// A missing directory yields an empty list.
fn sorted_entries(dir: &Path, keep: impl Fn(&Path) -> bool) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .flatten()
        .filter(|e| keep(&e.path()))
        .filter_map(|e| e.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}
