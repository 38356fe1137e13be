//! The shared settings document.
//!
//! Hooks live inside one JSON document rather than one file per hook, so
//! every hook mutation is a read-merge-write of the whole document. Unrelated
//! top-level keys are carried through the flattened `extra` map and survive
//! rewrites untouched.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use flowdeck_core::Result;

/// One action triggered by a hook entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookAction {
    #[serde(rename = "type", default = "default_action_kind")]
    pub kind: String,
    pub command: String,
}

fn default_action_kind() -> String {
    "command".to_string()
}

impl HookAction {
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            kind: default_action_kind(),
            command: command.into(),
        }
    }
}

/// One matcher entry under a hook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEntry {
    pub matcher: String,
    #[serde(default)]
    pub actions: Vec<HookAction>,
}

/// The settings document: a hooks map plus whatever else the user keeps there.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hooks: BTreeMap<String, Vec<HookEntry>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Read the settings document. Missing or malformed files degrade to the
/// default document (malformed is logged, not fatal).
pub fn read_settings(path: &Path) -> Settings {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read settings, using defaults");
            return Settings::default();
        }
    };
    match serde_json::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Malformed settings document, using defaults");
            Settings::default()
        }
    }
}

/// Pretty-print and write the settings document, creating parents as needed.
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut text = serde_json::to_string_pretty(settings)?;
    text.push('\n');
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_unrelated_keys() {
        let json = r#"{
            "theme": "dark",
            "hooks": {
                "PreToolUse": [
                    {"matcher": "Bash", "actions": [{"type": "command", "command": "echo hi"}]}
                ]
            }
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
        assert_eq!(settings.hooks["PreToolUse"][0].matcher, "Bash");

        let rendered = serde_json::to_string(&settings).unwrap();
        let reparsed: Settings = serde_json::from_str(&rendered).unwrap();
        assert_eq!(reparsed.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
    }

    #[test]
    fn missing_file_defaults() {
        let settings = read_settings(Path::new("/nonexistent/flowdeck/settings.json"));
        assert!(settings.hooks.is_empty());
        assert!(settings.extra.is_empty());
    }

    #[test]
    fn malformed_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let settings = read_settings(&path);
        assert!(settings.hooks.is_empty());
    }

    #[test]
    fn write_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let mut settings = Settings::default();
        settings.hooks.insert(
            "PostToolUse".to_string(),
            vec![HookEntry {
                matcher: "*".to_string(),
                actions: vec![HookAction::command("notify-send done")],
            }],
        );
        write_settings(&path, &settings).unwrap();

        let loaded = read_settings(&path);
        assert_eq!(loaded.hooks["PostToolUse"][0].actions[0].command, "notify-send done");
    }
}
