use std::collections::HashMap;

use parking_lot::Mutex;
use toolgate_protocol::Decision;

use crate::key::MemoryKey;

/// Two-tier decision cache. Tool-level entries ("always allow this tool,
/// whatever the parameters") outrank parameter-level entries; the engine
/// checks them in that order.
///
/// Both maps live for the broker's lifetime and grow without bound; they
/// are cleared only by an explicit `reset`. Lookups and records happen
/// from the poll task and from dialog continuations on other runtime
/// threads, hence the locks.
#[derive(Default)]
pub struct DecisionMemory {
    tool_always: Mutex<HashMap<String, bool>>,
    by_params: Mutex<HashMap<MemoryKey, Decision>>,
}

impl DecisionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup_tool(&self, tool_name: &str) -> Option<bool> {
        self.tool_always.lock().get(tool_name).copied()
    }

    pub fn lookup_params(&self, key: &MemoryKey) -> Option<Decision> {
        self.by_params.lock().get(key).copied()
    }

    pub fn record_tool_always(&self, tool_name: &str) {
        tracing::debug!("Recording tool-level always-allow for {}", tool_name);
        self.tool_always.lock().insert(tool_name.to_string(), true);
    }

    pub fn record_params(&self, key: MemoryKey, decision: Decision) {
        tracing::debug!("Recording parameter-level decision for {}", key);
        self.by_params.lock().insert(key, decision);
    }

    pub fn reset(&self) {
        self.tool_always.lock().clear();
        self.by_params.lock().clear();
    }
}
