use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use toolgate_interfaces::DecisionListener;
use toolgate_protocol::Decision;

/// One-listener broadcast of final verdicts, decoupled from the mailbox
/// mechanics. The listener runs on its own task; a panicking listener is
/// logged and never unwinds into the engine.
#[derive(Default)]
pub struct DecisionNotifier {
    listener: RwLock<Option<Arc<dyn DecisionListener>>>,
}

impl DecisionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last listener set wins.
    pub fn set_listener(&self, listener: Arc<dyn DecisionListener>) {
        *self.listener.write() = Some(listener);
    }

    pub fn notify(&self, tool_name: &str, inputs: &Map<String, Value>, decision: Decision) {
        let Some(listener) = self.listener.read().clone() else {
            return;
        };
        let tool_name = tool_name.to_string();
        let inputs = inputs.clone();
        tokio::spawn(async move {
            let call = tokio::spawn(async move {
                listener.on_decision(&tool_name, &inputs, decision).await;
            });
            if let Err(e) = call.await {
                tracing::error!("Decision listener failed: {}", e);
            }
        });
    }
}
