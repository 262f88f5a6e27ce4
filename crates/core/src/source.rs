use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::time::timeout;
use toolgate_interfaces::{DialogShower, FallbackPrompt};
use toolgate_protocol::Decision;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Dialog failed: {0}")]
    Dialog(String),
    #[error("Prompt timed out")]
    Timeout,
}

/// The two decision-acquisition strategies. Exactly one is active per
/// broker; the engine only cares about how the outcome arrives.
///
/// `Frontend` never blocks the poll loop: the engine spawns a continuation
/// that awaits the dialog future. `Fallback` is awaited inline on the poll
/// task, so while its prompt is open no other request is discovered. That
/// blocking is a deliberate trade-off of the fallback path, not a bug.
#[derive(Clone)]
pub enum DecisionSource {
    Frontend(Arc<dyn DialogShower>),
    Fallback(Arc<dyn FallbackPrompt>),
}

/// Runs the blocking prompt on a dedicated blocking thread and bounds the
/// wait. On timeout the thread is abandoned, not cancelled; its eventual
/// answer is discarded.
pub async fn resolve_fallback(
    prompt: Arc<dyn FallbackPrompt>,
    tool_name: String,
    inputs: Map<String, Value>,
    bound: Duration,
) -> Result<Decision, SourceError> {
    let handle = tokio::task::spawn_blocking(move || prompt.prompt(&tool_name, &inputs));
    match timeout(bound, handle).await {
        Ok(Ok(code)) => Ok(Decision::from_code(code).unwrap_or(Decision::Deny)),
        Ok(Err(join_err)) => Err(SourceError::Dialog(join_err.to_string())),
        Err(_) => Err(SourceError::Timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedPrompt(i64);

    impl FallbackPrompt for FixedPrompt {
        fn prompt(&self, _tool_name: &str, _inputs: &Map<String, Value>) -> i64 {
            self.0
        }
    }

    struct StalledPrompt;

    impl FallbackPrompt for StalledPrompt {
        fn prompt(&self, _tool_name: &str, _inputs: &Map<String, Value>) -> i64 {
            std::thread::sleep(Duration::from_millis(400));
            Decision::Allow.code()
        }
    }

    #[tokio::test]
    async fn test_fallback_maps_codes() {
        let decision = resolve_fallback(
            Arc::new(FixedPrompt(2)),
            "bash".into(),
            Map::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(decision, Decision::AllowAlways);
    }

    #[tokio::test]
    async fn test_fallback_unknown_code_is_deny() {
        let decision = resolve_fallback(
            Arc::new(FixedPrompt(99)),
            "bash".into(),
            Map::new(),
            Duration::from_secs(1),
        )
        .await
        .unwrap();
        assert_eq!(decision, Decision::Deny);
    }

    #[tokio::test]
    async fn test_fallback_times_out() {
        let outcome = resolve_fallback(
            Arc::new(StalledPrompt),
            "bash".into(),
            Map::new(),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(outcome, Err(SourceError::Timeout)));
    }
}
