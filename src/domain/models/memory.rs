//! Domain memory document model — per-session persistent structured state
//! (§3, §4.4, §6 `memory.json` shape).
//!
//! Adapted from the three-tier `MemoryTier`/episodic-decay model
//! (`domain/models/memory.rs`), replaced entirely: the
//! delegation engine's memory is a Goal→Feature hierarchy, not a
//! working/episodic/semantic cache. The document shape and
//! monotonic-version field are carried from the `Goal.version`
//! optimistic-locking idea.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::goal::Goal;
use super::progress::ProgressEntry;

/// `memory.json`'s `metadata` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryMetadata {
    pub session_id: Uuid,
    pub domain: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// The full per-session persisted document (§6 `memory.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainMemory {
    pub metadata: MemoryMetadata,
    #[serde(default)]
    pub state: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    /// Monotonic counter bumped on every mutation (supports clean
    /// round-trip/optimistic-concurrency checks; not exposed to agents).
    #[serde(default = "default_version")]
    pub version: u64,
}

fn default_version() -> u64 {
    1
}

impl DomainMemory {
    pub fn new(session_id: Uuid, domain: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            metadata: MemoryMetadata {
                session_id,
                domain: domain.into(),
                description: description.into(),
                created_at: Utc::now(),
            },
            state: HashMap::new(),
            goals: Vec::new(),
            progress: Vec::new(),
            version: 1,
        }
    }

    pub fn goal(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn goal_mut(&mut self, id: &str) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id == id)
    }

    /// Find the feature `fid` and the goal that owns it.
    pub fn find_feature_goal(&self, fid: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.feature(fid).is_some())
    }

    pub fn find_feature_goal_mut(&mut self, fid: &str) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.feature(fid).is_some())
    }

    /// Append a progress entry and bump the document version (I5).
    pub fn record(&mut self, entry: ProgressEntry) {
        self.progress.push(entry);
        self.version += 1;
    }
}
