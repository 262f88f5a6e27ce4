use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use toolgate_interfaces::DecisionListener;
use toolgate_protocol::Decision;

/// Appends one JSON line per arbitrated decision. Fills the "history /
/// audit view" collaborator role; a write failure is logged and never
/// reaches the engine.
pub struct AuditListener {
    file: Mutex<File>,
}

impl AuditListener {
    pub fn new<P: AsRef<Path>>(log_path: P) -> Result<Self, std::io::Error> {
        let log_path = log_path.as_ref();

        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait]
impl DecisionListener for AuditListener {
    async fn on_decision(&self, tool_name: &str, inputs: &Map<String, Value>, decision: Decision) {
        let entry = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "tool": tool_name,
            "inputs": inputs,
            "decision": format!("{:?}", decision),
            "allow": decision.is_allow(),
        });

        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{}", entry) {
            tracing::error!("Failed to append audit entry: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_appends_one_line_per_decision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit/decisions.jsonl");
        let listener = AuditListener::new(&path).unwrap();

        let mut inputs = Map::new();
        inputs.insert("command".into(), json!("ls"));
        listener.on_decision("bash", &inputs, Decision::AllowAlways).await;
        listener.on_decision("bash", &inputs, Decision::Deny).await;

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tool"], "bash");
        assert_eq!(first["decision"], "AllowAlways");
        assert_eq!(first["allow"], true);

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["allow"], false);
    }
}
