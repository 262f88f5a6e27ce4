use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const REQUEST_PREFIX: &str = "request-";
pub const RESPONSE_PREFIX: &str = "response-";
pub const FILE_EXTENSION: &str = ".json";

/// A permission request written by the agent process. The broker never
/// creates these; it only reads and eventually deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionRequest {
    pub request_id: String,
    pub tool_name: String,
    pub inputs: Map<String, Value>,
}

/// The broker's answer. Written exactly once per request id; the agent
/// process owns cleanup of response files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionResponse {
    pub allow: bool,
}

/// Verdict produced by a decision source or replayed from memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    AllowAlways,
    Deny,
}

impl Decision {
    /// Wire code used by dialog capabilities: 1=allow, 2=allow always, 3=deny.
    pub fn code(self) -> i64 {
        match self {
            Decision::Allow => 1,
            Decision::AllowAlways => 2,
            Decision::Deny => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Decision> {
        match code {
            1 => Some(Decision::Allow),
            2 => Some(Decision::AllowAlways),
            3 => Some(Decision::Deny),
            _ => None,
        }
    }

    pub fn is_allow(self) -> bool {
        matches!(self, Decision::Allow | Decision::AllowAlways)
    }
}

pub fn request_file_name(request_id: &str) -> String {
    format!("{}{}{}", REQUEST_PREFIX, request_id, FILE_EXTENSION)
}

pub fn response_file_name(request_id: &str) -> String {
    format!("{}{}{}", RESPONSE_PREFIX, request_id, FILE_EXTENSION)
}

/// Extracts the request id from a mailbox file name, or `None` when the
/// name does not follow the request naming convention.
pub fn request_id_from_file_name(name: &str) -> Option<&str> {
    name.strip_prefix(REQUEST_PREFIX)?.strip_suffix(FILE_EXTENSION)
}
