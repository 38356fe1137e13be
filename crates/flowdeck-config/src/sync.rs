//! Graph → artifact synchronization.
//!
//! The sync engine keeps on-disk artifacts eventually consistent with graph
//! edits, one mutation at a time. Writes are not transactional across
//! artifacts: an edge touching two nodes performs two independent writes, and
//! a partial failure is surfaced as a combined non-fatal error for the caller
//! to report. The next loader scan reconciles.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use flowdeck_core::config::ProjectConfig;
use flowdeck_core::types::{Edge, Node, NodeKind};
use flowdeck_core::{FlowdeckError, Result};

use crate::artifact::{self, Artifact};
use crate::settings::{self, HookAction, HookEntry};

/// Translates graph mutations into artifact operations and owns the
/// upstream/downstream reference invariant.
pub struct GraphSyncEngine {
    project: ProjectConfig,
}

impl GraphSyncEngine {
    pub fn new(project: ProjectConfig) -> Self {
        Self { project }
    }

    /// Sync one node's artifact, creating or merging as needed.
    ///
    /// Input and Output nodes have no on-disk representation and return
    /// `Ok(None)`. For the rest, only front-matter keys derived from the
    /// node's current fields are rewritten; unrecognized keys and the
    /// existing body survive untouched (unless the node supplies replacement
    /// body text).
    pub fn sync_node(&self, node: &Node) -> Result<Option<PathBuf>> {
        match node.kind {
            NodeKind::Input | NodeKind::Output => Ok(None),
            NodeKind::Skill => self.sync_skill(node).map(Some),
            NodeKind::Agent => self.sync_agent(node).map(Some),
            NodeKind::Hook => self.sync_hook(node).map(Some),
        }
    }

    /// Delete a node's artifact after cascading reference cleanup.
    ///
    /// Cleanup must complete (or fail loudly) before the node's own artifact
    /// is removed, so a failed cascade never leaves dangling forward
    /// references behind a missing artifact. Removal of the artifact itself
    /// is best-effort: a missing file is not an error.
    pub fn delete_node(&self, node: &Node, all_nodes: &mut [Node]) -> Result<()> {
        let slug = node.slug();
        if !slug.is_empty() {
            self.remove_references_to_node(&slug, node.kind, all_nodes)?;
        }
        match node.kind {
            NodeKind::Skill => {
                if slug.is_empty() {
                    return Ok(());
                }
                artifact::remove_dir(&self.project.skill_dir(&slug))?;
                info!(slug = %slug, "Removed skill artifact");
                Ok(())
            }
            NodeKind::Agent => {
                if slug.is_empty() {
                    return Ok(());
                }
                artifact::remove_file(&self.project.agent_doc(&slug))?;
                info!(slug = %slug, "Removed agent artifact");
                Ok(())
            }
            NodeKind::Hook => self.remove_hook_entry(node),
            NodeKind::Input | NodeKind::Output => Ok(()),
        }
    }

    /// Drop `deleted_slug` from every other node's reference lists and
    /// re-sync each node that changed.
    pub fn remove_references_to_node(
        &self,
        deleted_slug: &str,
        deleted_kind: NodeKind,
        all_nodes: &mut [Node],
    ) -> Result<()> {
        // only skill and agent slugs appear in reference lists
        if !matches!(deleted_kind, NodeKind::Skill | NodeKind::Agent) {
            return Ok(());
        }

        let mut failures = Vec::new();
        for other in all_nodes.iter_mut() {
            if other.slug() == deleted_slug {
                continue;
            }
            let changed = match other.kind {
                NodeKind::Agent => remove_slug(&mut other.fields.skills, deleted_slug),
                NodeKind::Skill => {
                    let up = remove_slug(&mut other.fields.upstream, deleted_slug);
                    let down = remove_slug(&mut other.fields.downstream, deleted_slug);
                    up || down
                }
                _ => false,
            };
            if !changed {
                continue;
            }
            match self.sync_node(other) {
                Ok(_) => {
                    debug!(node = %other.id, slug = %deleted_slug, "Removed dangling reference")
                }
                Err(e) => failures.push(format!("{}: {}", other.id, e)),
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlowdeckError::Sync(format!(
                "reference cleanup for '{}' failed on {}",
                deleted_slug,
                failures.join("; ")
            )))
        }
    }

    /// Record an edge in the reference lists of both endpoints.
    pub fn sync_edge(&self, edge: &Edge, nodes: &mut [Node]) -> Result<()> {
        self.apply_edge(edge, nodes, true)
    }

    /// Remove an edge from the reference lists of both endpoints.
    pub fn remove_edge(&self, edge: &Edge, nodes: &mut [Node]) -> Result<()> {
        self.apply_edge(edge, nodes, false)
    }

    /// Update exactly the reference-list fields implied by the kind pairing:
    /// Agent→Skill fills the agent's `skills` and the skill's `upstream`;
    /// Skill→Skill fills `downstream`/`upstream`; Skill→Agent fills only the
    /// skill's `downstream`. Other pairings touch no lists. Each side is
    /// written independently; failures are combined, not short-circuited.
    fn apply_edge(&self, edge: &Edge, nodes: &mut [Node], add: bool) -> Result<()> {
        let si = nodes
            .iter()
            .position(|n| n.id == edge.source)
            .ok_or_else(|| FlowdeckError::NodeNotFound(edge.source.clone()))?;
        let ti = nodes
            .iter()
            .position(|n| n.id == edge.target)
            .ok_or_else(|| FlowdeckError::NodeNotFound(edge.target.clone()))?;

        let source_kind = nodes[si].kind;
        let target_kind = nodes[ti].kind;
        let source_slug = nodes[si].slug();
        let target_slug = nodes[ti].slug();
        let mut failures = Vec::new();

        let source_changed = match (source_kind, target_kind) {
            (NodeKind::Agent, NodeKind::Skill) => {
                apply_slug(&mut nodes[si].fields.skills, &target_slug, add)
            }
            (NodeKind::Skill, NodeKind::Skill) | (NodeKind::Skill, NodeKind::Agent) => {
                apply_slug(&mut nodes[si].fields.downstream, &target_slug, add)
            }
            _ => false,
        };
        if source_changed {
            if let Err(e) = self.sync_node(&nodes[si]) {
                failures.push(format!("source {}: {}", nodes[si].id, e));
            }
        }

        let target_changed = match (source_kind, target_kind) {
            (NodeKind::Agent, NodeKind::Skill) | (NodeKind::Skill, NodeKind::Skill) => {
                apply_slug(&mut nodes[ti].fields.upstream, &source_slug, add)
            }
            _ => false,
        };
        if target_changed {
            if let Err(e) = self.sync_node(&nodes[ti]) {
                failures.push(format!("target {}: {}", nodes[ti].id, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(FlowdeckError::Sync(format!(
                "edge {} partially synced: {}",
                edge.id,
                failures.join("; ")
            )))
        }
    }

    fn sync_skill(&self, node: &Node) -> Result<PathBuf> {
        let slug = valid_slug(node)?;
        let path = self.project.skill_doc(&slug);
        let is_new = !path.exists();
        let mut doc = artifact::read_artifact(&path)?;

        doc.set("name", &node.label);
        merge_optional(&mut doc, "description", node.description.as_deref());
        doc.set_list("upstream", &node.fields.upstream);
        doc.set_list("downstream", &node.fields.downstream);

        merge_body(&mut doc, is_new, node.fields.body.as_deref(), || {
            format!(
                "# {}\n\nDescribe how this skill transforms its upstream input.\n",
                node.label
            )
        });

        artifact::write_artifact(&path, &doc)?;
        debug!(slug = %slug, path = %path.display(), "Synced skill artifact");
        Ok(path)
    }

    fn sync_agent(&self, node: &Node) -> Result<PathBuf> {
        let slug = valid_slug(node)?;
        let path = self.project.agent_doc(&slug);
        let is_new = !path.exists();
        let mut doc = artifact::read_artifact(&path)?;

        doc.set("name", &node.label);
        merge_optional(&mut doc, "description", node.description.as_deref());
        doc.set_list("tools", &node.fields.tools);
        merge_optional(&mut doc, "model", node.fields.model.as_deref());
        doc.set_list("skills", &node.fields.skills);

        merge_body(&mut doc, is_new, node.fields.body.as_deref(), || {
            format!(
                "You are {}. Complete the task described by your input.\n",
                node.label
            )
        });

        artifact::write_artifact(&path, &doc)?;
        debug!(slug = %slug, path = %path.display(), "Synced agent artifact");
        Ok(path)
    }

    /// Read-merge-write of the shared settings document: the node's entry is
    /// replaced when its matcher already exists under the event, appended
    /// otherwise.
    fn sync_hook(&self, node: &Node) -> Result<PathBuf> {
        let event = hook_event(node)?;
        let matcher = node
            .fields
            .matcher
            .clone()
            .unwrap_or_else(|| "*".to_string());
        let command = node.fields.command.clone().unwrap_or_default();

        let path = self.project.settings_path();
        let mut settings = settings::read_settings(&path);
        let entries = settings.hooks.entry(event).or_default();
        let action = HookAction::command(command);
        match entries.iter_mut().find(|e| e.matcher == matcher) {
            Some(entry) => entry.actions = vec![action],
            None => entries.push(HookEntry {
                matcher,
                actions: vec![action],
            }),
        }
        settings::write_settings(&path, &settings)?;
        debug!(node = %node.id, "Synced hook entry");
        Ok(path)
    }

    fn remove_hook_entry(&self, node: &Node) -> Result<()> {
        let Ok(event) = hook_event(node) else {
            return Ok(());
        };
        let matcher = node.fields.matcher.as_deref().unwrap_or("*");

        let path = self.project.settings_path();
        let mut settings = settings::read_settings(&path);
        let Some(entries) = settings.hooks.get_mut(&event) else {
            return Ok(());
        };
        let before = entries.len();
        entries.retain(|e| e.matcher != matcher);
        if entries.len() == before {
            return Ok(());
        }
        if entries.is_empty() {
            settings.hooks.remove(&event);
        }
        settings::write_settings(&path, &settings)?;
        info!(node = %node.id, event = %event, "Removed hook entry");
        Ok(())
    }
}

fn valid_slug(node: &Node) -> Result<String> {
    let slug = node.slug();
    if slug.is_empty() {
        warn!(node = %node.id, label = %node.label, "Node label yields empty slug");
        return Err(FlowdeckError::InvalidSlug(node.id.clone()));
    }
    Ok(slug)
}

fn hook_event(node: &Node) -> Result<String> {
    node.fields
        .event
        .clone()
        .filter(|e| !e.is_empty())
        .ok_or_else(|| {
            FlowdeckError::Config(format!("hook node '{}' has no event name", node.id))
        })
}

/// Set or remove an optional scalar key.
fn merge_optional(doc: &mut Artifact, key: &str, value: Option<&str>) {
    match value {
        Some(v) if !v.is_empty() => doc.set(key, v),
        _ => doc.remove(key),
    }
}

/// New artifacts get a templated body; existing bodies are preserved verbatim
/// unless the node explicitly supplies replacement text.
fn merge_body(doc: &mut Artifact, is_new: bool, replacement: Option<&str>, template: impl FnOnce() -> String) {
    if let Some(body) = replacement {
        doc.body = body.to_string();
    } else if is_new {
        doc.body = template();
    }
}

/// Add or remove a slug in an ordered reference list.
/// Idempotent: adding a present slug or removing an absent one is a no-op.
fn apply_slug(list: &mut Vec<String>, slug: &str, add: bool) -> bool {
    if slug.is_empty() {
        return false;
    }
    if add {
        if list.iter().any(|s| s == slug) {
            return false;
        }
        list.push(slug.to_string());
        true
    } else {
        remove_slug(list, slug)
    }
}

fn remove_slug(list: &mut Vec<String>, slug: &str) -> bool {
    let before = list.len();
    list.retain(|s| s != slug);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::types::NodeFields;

    fn engine(dir: &tempfile::TempDir) -> GraphSyncEngine {
        GraphSyncEngine::new(ProjectConfig::new(dir.path()))
    }

    fn agent(id: &str, label: &str) -> Node {
        Node::new(id, NodeKind::Agent, label)
    }

    fn skill(id: &str, label: &str, skill_id: Option<&str>) -> Node {
        Node::new(id, NodeKind::Skill, label).with_fields(NodeFields {
            skill_id: skill_id.map(String::from),
            ..Default::default()
        })
    }

    #[test]
    fn sync_node_is_noop_for_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let input = Node::new("i1", NodeKind::Input, "Brief");
        assert!(sync.sync_node(&input).unwrap().is_none());
        let output = Node::new("o1", NodeKind::Output, "Result");
        assert!(sync.sync_node(&output).unwrap().is_none());
    }

    #[test]
    fn sync_node_rejects_empty_slug() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let node = agent("a1", "!!!");
        assert!(matches!(
            sync.sync_node(&node),
            Err(FlowdeckError::InvalidSlug(_))
        ));
    }

    #[test]
    fn sync_node_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut node = agent("a1", "Writer").with_description("Writes reports");
        node.fields.tools = vec!["Read".into(), "Write".into()];

        let path = sync.sync_node(&node).unwrap().unwrap();
        let first = std::fs::read_to_string(&path).unwrap();
        sync.sync_node(&node).unwrap();
        let second = std::fs::read_to_string(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn merge_preserves_hand_edits() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let node = agent("a1", "Writer");
        let path = sync.sync_node(&node).unwrap().unwrap();

        // hand-edit: custom key and custom body
        let mut doc = artifact::read_artifact(&path).unwrap();
        doc.set("temperature", "0.2");
        doc.body = "Hand-written system prompt.\n".to_string();
        artifact::write_artifact(&path, &doc).unwrap();

        let mut node = node;
        node.fields.tools = vec!["Bash".into()];
        sync.sync_node(&node).unwrap();

        let doc = artifact::read_artifact(&path).unwrap();
        assert_eq!(doc.get("temperature"), Some("0.2"));
        assert_eq!(doc.get("tools"), Some("Bash"));
        assert_eq!(doc.body, "Hand-written system prompt.\n");
    }

    #[test]
    fn edge_sync_reference_symmetry() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut nodes = vec![agent("a1", "Writer"), skill("s1", "PDF", Some("pdf"))];
        let edge = Edge::new("e1", "a1", "s1");

        sync.sync_edge(&edge, &mut nodes).unwrap();
        assert_eq!(nodes[0].fields.skills, vec!["pdf"]);
        assert_eq!(nodes[1].fields.upstream, vec!["writer"]);

        let agent_doc = artifact::read_artifact(&dir.path().join("agents/writer.md")).unwrap();
        assert_eq!(agent_doc.get("skills"), Some("pdf"));
        let skill_doc = artifact::read_artifact(&dir.path().join("skills/pdf/SKILL.md")).unwrap();
        assert_eq!(skill_doc.get("upstream"), Some("writer"));

        // adding again is a no-op
        sync.sync_edge(&edge, &mut nodes).unwrap();
        assert_eq!(nodes[0].fields.skills, vec!["pdf"]);

        sync.remove_edge(&edge, &mut nodes).unwrap();
        assert!(nodes[0].fields.skills.is_empty());
        assert!(nodes[1].fields.upstream.is_empty());
        let agent_doc = artifact::read_artifact(&dir.path().join("agents/writer.md")).unwrap();
        assert_eq!(agent_doc.get("skills"), None);
    }

    #[test]
    fn skill_to_skill_edge_fills_both_lists() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut nodes = vec![
            skill("s1", "Extract", Some("extract")),
            skill("s2", "Render", Some("render")),
        ];
        sync.sync_edge(&Edge::new("e1", "s1", "s2"), &mut nodes).unwrap();
        assert_eq!(nodes[0].fields.downstream, vec!["render"]);
        assert_eq!(nodes[1].fields.upstream, vec!["extract"]);
    }

    #[test]
    fn skill_to_agent_edge_only_touches_skill() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut nodes = vec![skill("s1", "PDF", Some("pdf")), agent("a1", "Reviewer")];
        sync.sync_edge(&Edge::new("e1", "s1", "a1"), &mut nodes).unwrap();
        assert_eq!(nodes[0].fields.downstream, vec!["reviewer"]);
        assert!(nodes[1].fields.skills.is_empty());
    }

    #[test]
    fn cascade_on_delete_cleans_both_agents() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut nodes = vec![
            agent("a1", "Writer"),
            agent("a2", "Editor"),
            skill("s1", "PDF", Some("pdf")),
        ];
        sync.sync_edge(&Edge::new("e1", "a1", "s1"), &mut nodes).unwrap();
        sync.sync_edge(&Edge::new("e2", "a2", "s1"), &mut nodes).unwrap();
        assert_eq!(nodes[0].fields.skills, vec!["pdf"]);
        assert_eq!(nodes[1].fields.skills, vec!["pdf"]);

        let deleted = nodes[2].clone();
        sync.delete_node(&deleted, &mut nodes).unwrap();

        assert!(nodes[0].fields.skills.is_empty());
        assert!(nodes[1].fields.skills.is_empty());
        assert!(!dir.path().join("skills/pdf").exists());
        let doc = artifact::read_artifact(&dir.path().join("agents/writer.md")).unwrap();
        assert_eq!(doc.get("skills"), None);
    }

    #[test]
    fn delete_missing_artifact_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let node = agent("a1", "Never Synced");
        let mut nodes = vec![node.clone()];
        sync.delete_node(&node, &mut nodes).unwrap();
    }

    #[test]
    fn hook_entries_upsert_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let sync = engine(&dir);
        let mut hook = Node::new("h1", NodeKind::Hook, "Format on save");
        hook.fields.event = Some("PostToolUse".to_string());
        hook.fields.matcher = Some("Write".to_string());
        hook.fields.command = Some("cargo fmt".to_string());

        sync.sync_node(&hook).unwrap();
        let settings = settings::read_settings(&dir.path().join("settings.json"));
        assert_eq!(settings.hooks["PostToolUse"][0].actions[0].command, "cargo fmt");

        // same matcher replaces, not duplicates
        hook.fields.command = Some("cargo fmt --all".to_string());
        sync.sync_node(&hook).unwrap();
        let settings = settings::read_settings(&dir.path().join("settings.json"));
        assert_eq!(settings.hooks["PostToolUse"].len(), 1);
        assert_eq!(
            settings.hooks["PostToolUse"][0].actions[0].command,
            "cargo fmt --all"
        );

        let mut nodes = vec![hook.clone()];
        sync.delete_node(&hook, &mut nodes).unwrap();
        let settings = settings::read_settings(&dir.path().join("settings.json"));
        assert!(settings.hooks.is_empty());
    }

    #[test]
    fn hook_sync_preserves_unrelated_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"theme": "dark", "hooks": {}}"#,
        )
        .unwrap();
        let sync = engine(&dir);
        let mut hook = Node::new("h1", NodeKind::Hook, "Notify");
        hook.fields.event = Some("Stop".to_string());
        hook.fields.command = Some("notify-send done".to_string());
        sync.sync_node(&hook).unwrap();

        let settings = settings::read_settings(&dir.path().join("settings.json"));
        assert_eq!(settings.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
        assert_eq!(settings.hooks["Stop"][0].matcher, "*");
    }
}
