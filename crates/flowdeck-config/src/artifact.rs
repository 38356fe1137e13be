//! Front-matter artifact documents.
//!
//! An artifact is a plain-text file with an optional leading `---` delimited
//! key:value block followed by free-form body text. Artifacts are meant to
//! stay hand-editable: parsing is tolerant, key order is preserved, and a
//! merge never drops keys it does not recognize.

use std::path::Path;

use flowdeck_core::Result;

/// A parsed artifact: ordered front-matter pairs plus the body text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifact {
    pub front: Vec<(String, String)>,
    pub body: String,
}

impl Artifact {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.front
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, rewriting it in place when present and appending otherwise.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.front.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => self.front.push((key.to_string(), value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.front.retain(|(k, _)| k != key);
    }

    /// Read a comma-separated list value. Missing key yields an empty list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Write a comma-separated list value; an empty list removes the key.
    pub fn set_list(&mut self, key: &str, values: &[String]) {
        if values.is_empty() {
            self.remove(key);
        } else {
            self.set(key, values.join(", "));
        }
    }
}

/// Parse artifact text into front matter and body.
///
/// Splits on the first `---` pair. A missing or malformed delimiter pair
/// degrades to an empty front matter with the whole text as body; this is
/// never an error. Lines inside the block without a `:` are ignored.
pub fn parse_artifact(text: &str) -> Artifact {
    let Some(rest) = text.strip_prefix("---\n").or_else(|| {
        // allow a leading delimiter with trailing whitespace
        text.strip_prefix("---\r\n")
    }) else {
        return Artifact {
            front: Vec::new(),
            body: text.to_string(),
        };
    };

    let Some(end) = rest.find("\n---").map(|i| (i, &rest[i + 4..])) else {
        return Artifact {
            front: Vec::new(),
            body: text.to_string(),
        };
    };
    let (block_end, after) = end;
    // the closing delimiter must sit on its own line
    let after = match after.strip_prefix('\n') {
        Some(a) => a,
        None if after.is_empty() => "",
        None => {
            return Artifact {
                front: Vec::new(),
                body: text.to_string(),
            }
        }
    };

    let mut front = Vec::new();
    for line in rest[..block_end].lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            front.push((key.trim().to_string(), value.trim().to_string()));
        }
    }

    // one blank separator line between delimiter and body is formatting
    let body = after.strip_prefix('\n').unwrap_or(after).to_string();
    Artifact { front, body }
}

/// Render an artifact to its canonical text form.
pub fn render_artifact(artifact: &Artifact) -> String {
    let mut out = String::new();
    out.push_str("---\n");
    for (key, value) in &artifact.front {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push_str("---\n\n");
    out.push_str(&artifact.body);
    out
}

/// Read and parse an artifact. A missing file yields an empty artifact.
pub fn read_artifact(path: &Path) -> Result<Artifact> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(parse_artifact(&text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Artifact::new()),
        Err(e) => Err(e.into()),
    }
}

/// Render and write an artifact, creating parent directories as needed.
pub fn write_artifact(path: &Path, artifact: &Artifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_artifact(artifact))?;
    Ok(())
}

/// Best-effort file removal; a missing file is not an error.
pub fn remove_file(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Best-effort recursive directory removal; a missing directory is not an error.
pub fn remove_dir(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_front_matter_and_body() {
        let text = "---\nname: writer\ndescription: Writes reports\n---\n\nYou write reports.\n";
        let artifact = parse_artifact(text);
        assert_eq!(artifact.get("name"), Some("writer"));
        assert_eq!(artifact.get("description"), Some("Writes reports"));
        assert_eq!(artifact.body, "You write reports.\n");
    }

    #[test]
    fn malformed_delimiters_degrade_to_body() {
        let text = "no front matter here\njust body\n";
        let artifact = parse_artifact(text);
        assert!(artifact.front.is_empty());
        assert_eq!(artifact.body, text);

        let unterminated = "---\nname: x\nbody without closing delimiter\n";
        let artifact = parse_artifact(unterminated);
        assert!(artifact.front.is_empty());
        assert_eq!(artifact.body, unterminated);
    }

    #[test]
    fn render_parse_roundtrip() {
        let mut artifact = Artifact::new();
        artifact.set("name", "pdf");
        artifact.set("upstream", "writer");
        artifact.body = "Generate a PDF from the upstream text.\n".to_string();

        let rendered = render_artifact(&artifact);
        let parsed = parse_artifact(&rendered);
        assert_eq!(parsed, artifact);

        // rendering again is byte-identical
        assert_eq!(render_artifact(&parsed), rendered);
    }

    #[test]
    fn set_rewrites_in_place_preserving_order() {
        let mut artifact = parse_artifact("---\nname: a\ncustom: kept\ntools: Read\n---\n\nbody");
        artifact.set("tools", "Read, Write");
        artifact.set("model", "opus");
        let keys: Vec<&str> = artifact.front.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "custom", "tools", "model"]);
        assert_eq!(artifact.get("custom"), Some("kept"));
    }

    #[test]
    fn list_values_are_comma_separated() {
        let mut artifact = Artifact::new();
        artifact.set_list("skills", &["pdf".into(), "sheet".into()]);
        assert_eq!(artifact.get("skills"), Some("pdf, sheet"));
        assert_eq!(artifact.get_list("skills"), vec!["pdf", "sheet"]);

        artifact.set_list("skills", &[]);
        assert_eq!(artifact.get("skills"), None);
    }

    #[test]
    fn read_missing_file_is_empty() {
        let artifact = read_artifact(Path::new("/nonexistent/flowdeck/artifact.md")).unwrap();
        assert!(artifact.front.is_empty());
        assert!(artifact.body.is_empty());
    }
}
