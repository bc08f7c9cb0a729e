//! UI artifact domain model (§6 "Artifact output format", §3
//! `ArtifactExecution`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of artifact kinds a tool may emit (§6: "closed set ≥ 15").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Toolform,
    Batchtool,
    Querybuilder,
    Spreadsheet,
    Chart,
    Code,
    Markdown,
    Filetree,
    Wizard,
    Dashboard,
    Table,
    Form,
    Timeline,
    Diagram,
    Report,
    Checklist,
}

/// A parsed `artifact:<kind> { type, title, data }` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub title: String,
    pub data: serde_json::Value,
}

/// Record of a tool run triggered by a UI artifact (§3). Sessions keep a
/// bounded ring buffer (≤50) of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactExecution {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub artifact_kind: ArtifactKind,
    pub artifact_title: String,
    pub tool_name: String,
    pub args: serde_json::Value,
    pub result: String,
    pub summary: String,
    pub size: usize,
}

/// Bounded ring buffer of recent artifact executions (§3: "kept in a
/// bounded ring (≤50)").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactExecutionRing {
    capacity: usize,
    entries: std::collections::VecDeque<ArtifactExecution>,
}

impl ArtifactExecutionRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: std::collections::VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, execution: ArtifactExecution) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(execution);
    }

    pub fn recent(&self, n: usize) -> Vec<&ArtifactExecution> {
        self.entries.iter().rev().take(n).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_drops_oldest_past_capacity() {
        let mut ring = ArtifactExecutionRing::new(2);
        for i in 0..3 {
            ring.push(ArtifactExecution {
                id: Uuid::new_v4(),
                timestamp: Utc::now(),
                artifact_kind: ArtifactKind::Code,
                artifact_title: format!("a{i}"),
                tool_name: "builtin.read_file".to_string(),
                args: serde_json::json!({}),
                result: String::new(),
                summary: String::new(),
                size: 0,
            });
        }
        let recent = ring.recent(10);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].artifact_title, "a2");
    }
}
