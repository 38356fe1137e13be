//! Node executors and the kind → executor registry.
//!
//! Every executor satisfies the same contract: concatenated upstream text in,
//! text plus optional file artifacts out. The registry maps node kinds to
//! executors so new kinds plug in without touching the scheduler. The
//! built-in Agent/Skill/Hook executors produce templated text; real content
//! generation is an external capability swapped in by registering a
//! replacement.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use flowdeck_core::types::{FileRef, Node, NodeKind};
use flowdeck_core::Result;

/// What a node executor produces.
#[derive(Debug, Clone, Default)]
pub struct ExecutorOutput {
    pub output: String,
    pub artifacts: Vec<FileRef>,
}

impl ExecutorOutput {
    pub fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            artifacts: vec![],
        }
    }
}

/// Kind-specific node execution.
pub trait NodeExecutor: Send + Sync + 'static {
    /// Execute the node against the concatenated upstream output.
    fn execute<'a>(&'a self, node: &'a Node, input: &'a str) -> BoxFuture<'a, Result<ExecutorOutput>>;
}

/// Maps node kinds to executors.
pub struct ExecutorRegistry {
    executors: HashMap<NodeKind, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    /// An empty registry with no executors.
    pub fn empty() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in executors for every kind.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(NodeKind::Input, Arc::new(InputSource));
        registry.register(NodeKind::Output, Arc::new(PassThrough));
        registry.register(NodeKind::Agent, Arc::new(TemplateExecutor));
        registry.register(NodeKind::Skill, Arc::new(TemplateExecutor));
        registry.register(NodeKind::Hook, Arc::new(PassThrough));
        registry
    }

    /// Register (or replace) the executor for a kind.
    pub fn register(&mut self, kind: NodeKind, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&kind).cloned()
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Input nodes emit their literal content (falling back to the label).
struct InputSource;

impl NodeExecutor for InputSource {
    fn execute<'a>(&'a self, node: &'a Node, _input: &'a str) -> BoxFuture<'a, Result<ExecutorOutput>> {
        Box::pin(async move {
            let content = node
                .fields
                .content
                .clone()
                .unwrap_or_else(|| node.label.clone());
            Ok(ExecutorOutput::text(content))
        })
    }
}

/// Output and Hook nodes pass the upstream text through unchanged.
struct PassThrough;

impl NodeExecutor for PassThrough {
    fn execute<'a>(&'a self, _node: &'a Node, input: &'a str) -> BoxFuture<'a, Result<ExecutorOutput>> {
        Box::pin(async move { Ok(ExecutorOutput::text(input)) })
    }
}

/// Deterministic placeholder for content-generating kinds: a heading from
/// the node plus the upstream text.
struct TemplateExecutor;

impl NodeExecutor for TemplateExecutor {
    fn execute<'a>(&'a self, node: &'a Node, input: &'a str) -> BoxFuture<'a, Result<ExecutorOutput>> {
        Box::pin(async move {
            let mut text = format!("## {}\n\n", node.label);
            if let Some(ref description) = node.description {
                text.push_str(description);
                text.push_str("\n\n");
            }
            text.push_str(input);
            Ok(ExecutorOutput::text(text))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn input_source_emits_content() {
        let registry = ExecutorRegistry::with_builtins();
        let mut node = Node::new("i1", NodeKind::Input, "Brief");
        node.fields.content = Some("Write about Rust.".to_string());

        let executor = registry.get(NodeKind::Input).unwrap();
        let out = executor.execute(&node, "").await.unwrap();
        assert_eq!(out.output, "Write about Rust.");
    }

    #[tokio::test]
    async fn output_passes_input_through() {
        let registry = ExecutorRegistry::with_builtins();
        let node = Node::new("o1", NodeKind::Output, "Result");
        let executor = registry.get(NodeKind::Output).unwrap();
        let out = executor.execute(&node, "final text").await.unwrap();
        assert_eq!(out.output, "final text");
    }

    #[tokio::test]
    async fn registered_executor_replaces_builtin() {
        struct Fixed;
        impl NodeExecutor for Fixed {
            fn execute<'a>(
                &'a self,
                _node: &'a Node,
                _input: &'a str,
            ) -> BoxFuture<'a, Result<ExecutorOutput>> {
                Box::pin(async { Ok(ExecutorOutput::text("fixed")) })
            }
        }

        let mut registry = ExecutorRegistry::with_builtins();
        registry.register(NodeKind::Agent, Arc::new(Fixed));
        let node = Node::new("a1", NodeKind::Agent, "Writer");
        let out = registry
            .get(NodeKind::Agent)
            .unwrap()
            .execute(&node, "ignored")
            .await
            .unwrap();
        assert_eq!(out.output, "fixed");
    }

    #[test]
    fn empty_registry_has_no_executors() {
        let registry = ExecutorRegistry::empty();
        assert!(registry.get(NodeKind::Input).is_none());
    }
}
