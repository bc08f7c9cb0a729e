//! Parsed tool invocation (§3 `ToolCall`, §4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A byte range into the response text a carrier was extracted from, used
/// to deduplicate overlapping matches (§4.1 rule b, P9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// `self` is fully contained within `other`.
    pub fn is_contained_in(&self, other: &ByteRange) -> bool {
        self.start >= other.start && self.end <= other.end
    }

    pub fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One parsed tool invocation extracted from a model response.
///
/// `arguments` uses `serde_json::Value` as the tagged-variant argument
/// representation called for by the design notes (§9): a JSON `Value` is
/// already string/number/bool/array/object/null, so no separate enum is
/// introduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Fully-qualified name: `server.tool` or `builtin.tool`.
    pub name: String,
    pub arguments: Value,
    pub origin: ByteRange,
}

impl ToolCall {
    /// Split a fully-qualified name into `(server_or_builtin, tool)`. Names
    /// without a dot resolve against built-ins (§4.1 rule d).
    pub fn split_name(&self) -> (&str, &str) {
        match self.name.split_once('.') {
            Some((server, tool)) => (server, tool),
            None => ("builtin", self.name.as_str()),
        }
    }
}
