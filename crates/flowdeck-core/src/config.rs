use std::path::PathBuf;

/// Primary document name inside each skill directory.
pub const SKILL_DOC: &str = "SKILL.md";
/// File extension for agent documents.
pub const AGENT_EXT: &str = "md";
/// Shared settings document holding hook entries.
pub const SETTINGS_FILE: &str = "settings.json";

/// Locations of the persisted configuration artifacts for one project.
///
/// Layout under the project root:
/// - `skills/<slug>/SKILL.md` — one directory per skill
/// - `agents/<slug>.md` — one file per agent
/// - `settings.json` — hooks keyed by event name
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub root: PathBuf,
}

impl ProjectConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn skills_dir(&self) -> PathBuf {
        self.root.join("skills")
    }

    pub fn skill_doc(&self, slug: &str) -> PathBuf {
        self.skills_dir().join(slug).join(SKILL_DOC)
    }

    pub fn skill_dir(&self, slug: &str) -> PathBuf {
        self.skills_dir().join(slug)
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_doc(&self, slug: &str) -> PathBuf {
        self.agents_dir().join(format!("{}.{}", slug, AGENT_EXT))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }
}
