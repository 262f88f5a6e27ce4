use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use toolgate_protocol::Decision;

#[derive(Debug, Error)]
#[error("Dialog failed: {0}")]
pub struct DialogError(pub String);

/// Asynchronous front-end permission dialog. `show` resolves to a decision
/// code (1=allow, 2=allow always, 3=deny); it may stay pending for as long
/// as the human takes, and several dialogs may be outstanding at once.
#[async_trait]
pub trait DialogShower: Send + Sync {
    async fn show(&self, tool_name: &str, inputs: &Map<String, Value>) -> Result<i64, DialogError>;
}

/// Blocking native prompt used when no front-end dialog is registered.
/// Runs on a blocking thread; the engine bounds the wait and treats a
/// timeout as deny.
pub trait FallbackPrompt: Send + Sync {
    fn prompt(&self, tool_name: &str, inputs: &Map<String, Value>) -> i64;
}

/// Observer for arbitrated decisions (history views, audit logs). Invoked
/// once per request on its own task, after the response has been written.
#[async_trait]
pub trait DecisionListener: Send + Sync {
    async fn on_decision(&self, tool_name: &str, inputs: &Map<String, Value>, decision: Decision);
}
