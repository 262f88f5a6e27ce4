use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Host configuration. The mailbox directory is the broker's only real
/// environment dependency; everything else has defaults.
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    pub mailbox_dir: Option<PathBuf>,
    pub audit_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mailbox_dir: None,
            audit_log: PathBuf::from("./data/decisions.jsonl"),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Resolution order: TOOLGATE_MAILBOX_DIR, then the config file, then
    /// the shared temp-dir mailbox the agent side uses by default.
    pub fn mailbox_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("TOOLGATE_MAILBOX_DIR") {
            return PathBuf::from(dir);
        }
        self.mailbox_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("claude-permission"))
    }
}
