//! Session Manager (§2, §4.4, §5): owns per-session state — chat history,
//! the active domain memory, model overrides, and a streaming channel for
//! progress events — plus idle-timeout garbage collection.
//!
//! Adapted from the `SessionService` (`services/
//! session_service.rs`): same create/get/update-through-a-lock shape,
//! generalized from a `SessionRepository` trait over a durable store to an
//! in-process map owning each session's [`MemoryStore`] directly (the
//! memory store already does its own disk persistence, §4.4), and extended
//! with the active-task counter that makes idle GC wait for quiescence
//! instead of cancelling in-flight work (§5 "Cancellation and timeouts").

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::domain::error::SessionError;
use crate::domain::models::session::Session;
use crate::services::memory_store::MemoryStore;

/// Default idle timeout before a session becomes eligible for GC (§3
/// Session lifecycle: "GC'd after idle timeout").
pub const DEFAULT_IDLE_TIMEOUT: ChronoDuration = ChronoDuration::minutes(30);

/// A progress event broadcast to anything following a session (no terminal
/// or web frontend consumes it yet, but the channel itself is in §2
/// "streaming channels").
#[derive(Debug, Clone)]
pub enum SessionEvent {
    TaskStarted { task_id: String },
    TaskFinished { task_id: String, status: String },
    Message { role: String, content: String },
}

struct SessionEntry {
    session: Session,
    memory: Arc<MemoryStore>,
    /// Count of plans/tasks currently running against this session; GC
    /// only reclaims a session once this reaches zero (§5).
    active_tasks: usize,
    events: broadcast::Sender<SessionEvent>,
}

/// Owns every live session. A single `Mutex` around the whole map matches
/// the session-count scale this engine targets (interactive, single-user-at-
/// a-time sessions, not a high-fanout server) — `SessionService` serializes
/// through its repository the same way.
pub struct SessionManager {
    storage_dir: PathBuf,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    idle_timeout: ChronoDuration,
}

impl SessionManager {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self { storage_dir: storage_dir.into(), sessions: Mutex::new(HashMap::new()), idle_timeout: DEFAULT_IDLE_TIMEOUT }
    }

    pub fn with_idle_timeout(mut self, timeout: ChronoDuration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Start a brand-new session with a fresh domain memory document.
    pub async fn create(&self, domain: impl Into<String>, description: impl Into<String>) -> Uuid {
        let session = Session::new(domain.into(), description.into());
        let id = session.id;
        let memory = Arc::new(MemoryStore::new(&self.storage_dir, id, session.domain.clone(), session.description.clone()));
        let (events, _) = broadcast::channel(256);
        self.sessions.lock().await.insert(id, SessionEntry { session, memory, active_tasks: 0, events });
        id
    }

    /// Resume a session whose memory document already exists on disk.
    pub async fn resume(&self, domain: &str, id: Uuid) -> Result<(), SessionError> {
        if !MemoryStore::exists(&self.storage_dir, domain, id) {
            return Err(SessionError::NotFound(id.to_string()));
        }
        let memory = Arc::new(MemoryStore::load(&self.storage_dir, domain, id).map_err(|_| SessionError::NotFound(id.to_string()))?);
        let snapshot = memory.snapshot().await;
        let mut session = Session::new(domain, snapshot.metadata.description.clone());
        session.id = id;
        session.created_at = snapshot.metadata.created_at;
        let (events, _) = broadcast::channel(256);
        self.sessions.lock().await.insert(id, SessionEntry { session, memory, active_tasks: 0, events });
        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, SessionError> {
        self.sessions.lock().await.get(&id).map(|e| e.session.clone()).ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn memory(&self, id: Uuid) -> Result<Arc<MemoryStore>, SessionError> {
        self.sessions.lock().await.get(&id).map(|e| e.memory.clone()).ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn subscribe(&self, id: Uuid) -> Result<broadcast::Receiver<SessionEvent>, SessionError> {
        self.sessions.lock().await.get(&id).map(|e| e.events.subscribe()).ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    pub async fn push_turn(&self, id: Uuid, role: impl Into<String>, content: impl Into<String>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        let role = role.into();
        let content = content.into();
        entry.session.push_turn(role.clone(), content.clone());
        entry.events.send(SessionEvent::Message { role, content }).ok();
        Ok(())
    }

    pub async fn set_model_override(&self, id: Uuid, role: impl Into<String>, model: impl Into<String>) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.session.model_overrides.insert(role.into(), model.into());
        entry.session.touch();
        Ok(())
    }

    /// Mark a plan as starting against `id`; only one plan runs per session
    /// at a time (§3 Plan: "one active at a time").
    pub async fn begin_plan(&self, id: Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        if entry.active_tasks > 0 {
            return Err(SessionError::AlreadyRunning(id.to_string()));
        }
        entry.active_tasks = 1;
        entry.session.touch();
        Ok(())
    }

    pub async fn end_plan(&self, id: Uuid) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(&id).ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.active_tasks = entry.active_tasks.saturating_sub(1);
        entry.session.touch();
        Ok(())
    }

    pub async fn notify_task(&self, id: Uuid, event: SessionEvent) {
        if let Some(entry) = self.sessions.lock().await.get(&id) {
            entry.events.send(event).ok();
        }
    }

    /// Remove every session idle past the configured timeout *with no
    /// in-flight plan*. A session with `active_tasks > 0` is left alone no
    /// matter how stale its `last_active_at` is — GC waits for quiescence,
    /// it never cancels running work (§5).
    pub async fn sweep_idle(&self) -> Vec<Uuid> {
        let mut sessions = self.sessions.lock().await;
        let idle: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, e)| e.active_tasks == 0 && e.session.is_idle(self.idle_timeout))
            .map(|(id, _)| *id)
            .collect();
        for id in &idle {
            sessions.remove(id);
        }
        idle
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn create_and_fetch_a_session() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let id = manager.create("demo", "a test session").await;
        let session = manager.get(id).await.unwrap();
        assert_eq!(session.domain, "demo");
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let err = manager.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn only_one_plan_runs_at_a_time() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let id = manager.create("demo", "x").await;
        manager.begin_plan(id).await.unwrap();
        let err = manager.begin_plan(id).await.unwrap_err();
        assert!(matches!(err, SessionError::AlreadyRunning(_)));
        manager.end_plan(id).await.unwrap();
        manager.begin_plan(id).await.unwrap();
    }

    #[tokio::test]
    async fn idle_sweep_skips_sessions_with_in_flight_plans() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path()).with_idle_timeout(ChronoDuration::seconds(-1));
        let id = manager.create("demo", "x").await;
        manager.begin_plan(id).await.unwrap();

        let reclaimed = manager.sweep_idle().await;
        assert!(reclaimed.is_empty());
        assert_eq!(manager.session_count().await, 1);

        manager.end_plan(id).await.unwrap();
        let reclaimed = manager.sweep_idle().await;
        assert_eq!(reclaimed, vec![id]);
        assert_eq!(manager.session_count().await, 0);
    }

    #[tokio::test]
    async fn push_turn_appends_to_history_and_broadcasts() {
        let dir = tempdir().unwrap();
        let manager = SessionManager::new(dir.path());
        let id = manager.create("demo", "x").await;
        let mut rx = manager.subscribe(id).await.unwrap();

        manager.push_turn(id, "user", "hello").await.unwrap();

        let session = manager.get(id).await.unwrap();
        assert_eq!(session.history.len(), 1);
        assert_eq!(session.history[0].content, "hello");
        matches!(rx.try_recv().unwrap(), SessionEvent::Message { .. });
    }
}
