use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::slug::slugify;

/// Unique run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Input,
    Agent,
    Skill,
    Hook,
    Output,
}

impl NodeKind {
    /// Input and Output nodes mark the graph boundary and have no artifact.
    pub fn is_boundary(&self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Output)
    }

    /// Whether nodes of this kind own an on-disk artifact.
    pub fn has_artifact(&self) -> bool {
        matches!(self, NodeKind::Skill | NodeKind::Agent | NodeKind::Hook)
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeKind::Input => "input",
            NodeKind::Agent => "agent",
            NodeKind::Skill => "skill",
            NodeKind::Hook => "hook",
            NodeKind::Output => "output",
        };
        write!(f, "{}", s)
    }
}

/// A 2D canvas position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Kind-specific node data.
///
/// Kept flat so node snapshots stay a single JSON object on the wire;
/// fields irrelevant to a node's kind are simply left at their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFields {
    /// Tool names available to an agent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
    /// Model override for an agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Slugs of skills an agent invokes (downstream references).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skills: Vec<String>,

    /// Explicit machine id for a skill; preferred over the label slug.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    /// Slugs of nodes feeding into a skill.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upstream: Vec<String>,
    /// Slugs of nodes a skill feeds into.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downstream: Vec<String>,

    /// Hook event name (e.g., "PreToolUse").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    /// Hook matcher pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    /// Hook shell command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Literal content of an Input node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Replacement artifact body; when absent the on-disk body is preserved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// A node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier, stable within a session.
    pub id: String,
    pub kind: NodeKind,
    /// Human-readable name.
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub fields: NodeFields,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            label: label.into(),
            description: None,
            position: None,
            fields: NodeFields::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_fields(mut self, fields: NodeFields) -> Self {
        self.fields = fields;
        self
    }

    /// The cross-reference key this node uses inside artifacts.
    ///
    /// Skill nodes prefer their explicit machine id; everything else derives
    /// from the label. Slugs are weak references: collisions are accepted
    /// and lookups against the live node set may fail after a rename.
    pub fn slug(&self) -> String {
        if self.kind == NodeKind::Skill {
            if let Some(ref id) = self.fields.skill_id {
                if !id.is_empty() {
                    return id.clone();
                }
            }
        }
        slugify(&self.label)
    }
}

/// A directed connection between two nodes.
///
/// Invariants (no self-loops, no edges into Input or out of Output) are
/// enforced at the mutation boundary, not re-validated downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
        }
    }
}

/// A file produced by a node executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Outcome of executing one node, accumulated for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub node_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn ok(node_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: true,
            output: Some(output.into()),
            artifacts: vec![],
            error: None,
        }
    }

    pub fn failed(node_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            success: false,
            output: None,
            artifacts: vec![],
            error: Some(error.into()),
        }
    }
}

/// Log severity for interleaved run log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A lifecycle or log event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunEvent {
    NodeStarted {
        run_id: String,
        node_id: String,
    },
    NodeCompleted {
        run_id: String,
        node_id: String,
        result: ExecutionResult,
    },
    NodeFailed {
        run_id: String,
        node_id: String,
        error: String,
    },
    Log {
        level: LogLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        node_id: Option<String>,
    },
    RunCompleted {
        run_id: String,
        results: Vec<ExecutionResult>,
    },
    RunFailed {
        run_id: String,
        node_id: String,
        error: String,
    },
    RunCancelled {
        run_id: String,
    },
}

impl RunEvent {
    /// The run this event belongs to, if any (log lines are unscoped).
    pub fn run_id(&self) -> Option<&str> {
        match self {
            RunEvent::NodeStarted { run_id, .. }
            | RunEvent::NodeCompleted { run_id, .. }
            | RunEvent::NodeFailed { run_id, .. }
            | RunEvent::RunCompleted { run_id, .. }
            | RunEvent::RunFailed { run_id, .. }
            | RunEvent::RunCancelled { run_id } => Some(run_id),
            RunEvent::Log { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_slug_from_label() {
        let node = Node::new("a1", NodeKind::Agent, "Report Writer");
        assert_eq!(node.slug(), "report-writer");
    }

    #[test]
    fn skill_slug_prefers_machine_id() {
        let mut node = Node::new("s1", NodeKind::Skill, "PDF Generator");
        node.fields.skill_id = Some("pdf".to_string());
        assert_eq!(node.slug(), "pdf");

        node.fields.skill_id = None;
        assert_eq!(node.slug(), "pdf-generator");
    }

    #[test]
    fn boundary_kinds_have_no_artifact() {
        assert!(NodeKind::Input.is_boundary());
        assert!(NodeKind::Output.is_boundary());
        assert!(!NodeKind::Input.has_artifact());
        assert!(NodeKind::Skill.has_artifact());
        assert!(NodeKind::Hook.has_artifact());
    }

    #[test]
    fn run_event_serialization_roundtrip() {
        let event = RunEvent::NodeCompleted {
            run_id: "r1".into(),
            node_id: "n1".into(),
            result: ExecutionResult::ok("n1", "done"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""kind":"node_completed""#));
        let parsed: RunEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.run_id(), Some("r1"));
    }

    #[test]
    fn node_snapshot_deserializes_with_defaults() {
        let json = r#"{"id":"i1","kind":"input","label":"Brief"}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, NodeKind::Input);
        assert!(node.fields.tools.is_empty());
        assert!(node.position.is_none());
    }
}
