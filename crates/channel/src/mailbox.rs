use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use toolgate_protocol::{
    request_file_name, request_id_from_file_name, response_file_name, PermissionRequest,
    PermissionResponse,
};

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed request {0}: {1}")]
    Malformed(String, #[source] serde_json::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directory mailbox shared with the agent process.
///
/// The directory is polled, not watched. Both sides run as unrelated
/// processes, so file presence is the only contract: a request is owned by
/// the broker only once it has been read successfully, and the agent may
/// delete or rewrite files underneath us at any time.
pub struct RequestChannel {
    dir: PathBuf,
}

impl RequestChannel {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn initialize(&self) -> Result<(), ChannelError> {
        fs::create_dir_all(&self.dir).await?;
        tracing::info!("Request channel initialized at {:?}", self.dir);
        Ok(())
    }

    /// Enumerates pending request ids. Non-blocking; recreates the mailbox
    /// directory when it has gone missing instead of failing the tick.
    pub async fn scan(&self) -> Result<Vec<String>, ChannelError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir).await?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id) = request_id_from_file_name(name) {
                    ids.push(id.to_string());
                }
            }
        }
        Ok(ids)
    }

    pub async fn read(&self, request_id: &str) -> Result<PermissionRequest, ChannelError> {
        let path = self.request_path(request_id);
        let content = fs::read_to_string(&path).await?;
        serde_json::from_str(&content)
            .map_err(|e| ChannelError::Malformed(request_id.to_string(), e))
    }

    /// Idempotent: a second write for the same id overwrites the first.
    pub async fn write_response(
        &self,
        request_id: &str,
        response: &PermissionResponse,
    ) -> Result<(), ChannelError> {
        let path = self.response_path(request_id);
        let body = serde_json::to_string(response)?;
        fs::write(&path, body).await?;
        tracing::debug!("Wrote response for {}: allow={}", request_id, response.allow);
        Ok(())
    }

    /// Best-effort removal; an already-absent file is not an error.
    pub async fn delete_request(&self, request_id: &str) -> Result<(), ChannelError> {
        let path = self.request_path(request_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn request_path(&self, request_id: &str) -> PathBuf {
        self.dir.join(request_file_name(request_id))
    }

    fn response_path(&self, request_id: &str) -> PathBuf {
        self.dir.join(response_file_name(request_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (tempfile::TempDir, RequestChannel) {
        let dir = tempfile::tempdir().unwrap();
        let channel = RequestChannel::new(dir.path());
        (dir, channel)
    }

    #[tokio::test]
    async fn test_scan_finds_request_files_only() {
        let (dir, channel) = channel();
        std::fs::write(
            dir.path().join("request-r1.json"),
            r#"{"requestId":"r1","toolName":"bash","inputs":{}}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("response-r0.json"), r#"{"allow":true}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let ids = channel.scan().await.unwrap();
        assert_eq!(ids, vec!["r1".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_recreates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("mailbox");
        let channel = RequestChannel::new(&missing);

        let ids = channel.scan().await.unwrap();
        assert!(ids.is_empty());
        assert!(missing.exists());
    }

    #[tokio::test]
    async fn test_read_parses_request() {
        let (dir, channel) = channel();
        std::fs::write(
            dir.path().join("request-r1.json"),
            r#"{"requestId":"r1","toolName":"bash","inputs":{"command":"ls"}}"#,
        )
        .unwrap();

        let request = channel.read("r1").await.unwrap();
        assert_eq!(request.request_id, "r1");
        assert_eq!(request.tool_name, "bash");
        assert_eq!(request.inputs.get("command").unwrap(), "ls");
    }

    #[tokio::test]
    async fn test_read_malformed_body() {
        let (dir, channel) = channel();
        std::fs::write(dir.path().join("request-r1.json"), "not json at all").unwrap();

        let err = channel.read("r1").await.unwrap_err();
        assert!(matches!(err, ChannelError::Malformed(id, _) if id == "r1"));
    }

    #[tokio::test]
    async fn test_read_missing_required_field() {
        let (dir, channel) = channel();
        std::fs::write(
            dir.path().join("request-r1.json"),
            r#"{"requestId":"r1","inputs":{}}"#,
        )
        .unwrap();

        assert!(matches!(
            channel.read("r1").await,
            Err(ChannelError::Malformed(_, _))
        ));
    }

    #[tokio::test]
    async fn test_write_response_overwrites() {
        let (dir, channel) = channel();
        channel
            .write_response("r1", &PermissionResponse { allow: true })
            .await
            .unwrap();
        channel
            .write_response("r1", &PermissionResponse { allow: false })
            .await
            .unwrap();

        let body = std::fs::read_to_string(dir.path().join("response-r1.json")).unwrap();
        assert_eq!(body, r#"{"allow":false}"#);
    }

    #[tokio::test]
    async fn test_delete_absent_request_is_ok() {
        let (_dir, channel) = channel();
        channel.delete_request("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_removes_request() {
        let (dir, channel) = channel();
        let path = dir.path().join("request-r1.json");
        std::fs::write(&path, "{}").unwrap();

        channel.delete_request("r1").await.unwrap();
        assert!(!path.exists());
    }
}
