//! Session domain model — a user's conversation with persistent memory
//! (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One turn of chat history kept in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    pub ts: DateTime<Utc>,
}

/// A user's conversation, owning its active domain memory id and chat
/// history. Owned by the Session Manager (§2); the memory document itself
/// lives in [`crate::services::memory_store::MemoryStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub domain: String,
    pub description: String,
    pub history: Vec<ChatTurn>,
    pub model_overrides: std::collections::HashMap<String, String>,
}

impl Session {
    pub fn new(domain: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_active_at: now,
            domain: domain.into(),
            description: description.into(),
            history: Vec::new(),
            model_overrides: std::collections::HashMap::new(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    pub fn is_idle(&self, timeout: chrono::Duration) -> bool {
        Utc::now() - self.last_active_at > timeout
    }

    pub fn push_turn(&mut self, role: impl Into<String>, content: impl Into<String>) {
        self.history.push(ChatTurn {
            role: role.into(),
            content: content.into(),
            ts: Utc::now(),
        });
        self.touch();
    }
}
