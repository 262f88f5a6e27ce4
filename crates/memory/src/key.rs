use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};

/// Cache key scoping a remembered decision to one tool + parameter shape.
///
/// The hash is not collision-free; for this advisory cache the worst case
/// of a collision is an extra prompt or an over-broad remembered verdict.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryKey(String);

impl MemoryKey {
    /// Two requests with the same tool name and semantically identical
    /// inputs derive the same key. serde_json keeps object keys sorted, so
    /// serializing the map is already a canonical form.
    pub fn derive(tool_name: &str, inputs: &Map<String, Value>) -> Self {
        let canonical = serde_json::to_string(inputs).unwrap_or_default();
        let mut hasher = DefaultHasher::new();
        canonical.hash(&mut hasher);
        MemoryKey(format!("{}:{:016x}", tool_name, hasher.finish()))
    }
}

impl fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
