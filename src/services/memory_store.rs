//! Domain Memory Store (§4.4): one `DomainMemory` per `(domain, session_id)`
//! pair, persisted as `memory.json` plus an append-only `progress.log` plus a
//! `backups/` directory of rotated snapshots. All mutation goes through the
//! handful of operations below so every change can be invariant-checked and
//! logged in one place (§4.3 "Memory tools are the only path").
//!
//! Grounded in the `infrastructure/config/loader.rs` atomic
//! write-temp-then-rename pattern (reused here for `memory.json`) and in its
//! `domain/error.rs` per-component error style.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::error::MemoryError;
use crate::domain::models::feature::{Feature, FeatureStatus, TestResult};
use crate::domain::models::goal::Goal;
use crate::domain::models::memory::DomainMemory;
use crate::domain::models::progress::ProgressEntry;

const MAX_BACKUPS: usize = 10;

/// Where one session's memory document lives on disk (§6 layout).
pub struct SessionPaths {
    root: PathBuf,
}

impl SessionPaths {
    pub fn new(storage_dir: impl AsRef<Path>, domain: &str, session_id: Uuid) -> Self {
        Self {
            root: storage_dir.as_ref().join(domain).join(session_id.to_string()),
        }
    }

    pub fn memory_json(&self) -> PathBuf {
        self.root.join("memory.json")
    }

    pub fn progress_log(&self) -> PathBuf {
        self.root.join("progress.log")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("backups")
    }
}

/// Owns one session's `DomainMemory` behind a mutex (§4.4 "a session holds a
/// mutex for its own memory"). Mutation methods acquire the lock; reads take
/// an unlocked snapshot clone.
pub struct MemoryStore {
    paths: SessionPaths,
    doc: Mutex<DomainMemory>,
}

impl MemoryStore {
    /// Bootstrap a new, empty document (used when the Initializer role
    /// populates the skeleton fresh — §4.4 "Session creation").
    pub fn new(storage_dir: impl AsRef<Path>, session_id: Uuid, domain: impl Into<String>, description: impl Into<String>) -> Self {
        let domain = domain.into();
        let paths = SessionPaths::new(storage_dir, &domain, session_id);
        Self {
            paths,
            doc: Mutex::new(DomainMemory::new(session_id, domain, description)),
        }
    }

    /// Resume a session from its existing `memory.json` (§4.4 "resumed from
    /// an existing memory file").
    pub fn load(storage_dir: impl AsRef<Path>, domain: &str, session_id: Uuid) -> Result<Self, MemoryError> {
        let paths = SessionPaths::new(storage_dir, domain, session_id);
        let text = std::fs::read_to_string(paths.memory_json()).map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        let doc: DomainMemory = serde_json::from_str(&text).map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        Ok(Self { paths, doc: Mutex::new(doc) })
    }

    pub fn exists(storage_dir: impl AsRef<Path>, domain: &str, session_id: Uuid) -> bool {
        SessionPaths::new(storage_dir, domain, session_id).memory_json().exists()
    }

    /// Unlocked snapshot of the full document (reads are copy-on-read, §4.4).
    pub async fn snapshot(&self) -> DomainMemory {
        self.doc.lock().await.clone()
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.paths.artifacts_dir()
    }

    // -- mutation operations -------------------------------------------------

    pub async fn add_goal(&self, goal: Goal, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        if doc.goal(&goal.id).is_some() {
            return Err(MemoryError::DuplicateId(goal.id));
        }
        let gid = goal.id.clone();
        doc.goals.push(goal);
        doc.record(ProgressEntry::new(agent, "add_goal", "ok"));
        self.flush(&mut doc).await?;
        drop(doc);
        tracing::info!(goal_id = %gid, "goal added");
        Ok(())
    }

    pub async fn add_feature(&self, gid: &str, feature: Feature, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        if doc.find_feature_goal(&feature.id).is_some() {
            return Err(MemoryError::DuplicateId(feature.id));
        }
        let fid = feature.id.clone();
        let goal = doc.goal_mut(gid).ok_or_else(|| MemoryError::GoalNotFound(gid.to_string()))?;
        goal.features.push(feature);
        goal.recompute_status();
        doc.record(ProgressEntry::new(agent, "add_feature", "ok").with_feature(fid));
        self.flush(&mut doc).await
    }

    /// §4.4 `update_feature_status`: rejects `completed` with an attached
    /// failing test result (I3) unless `force` is set.
    pub async fn update_feature_status(&self, fid: &str, status: FeatureStatus, notes: Option<String>, force: bool, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        let goal = doc.find_feature_goal_mut(fid).ok_or_else(|| MemoryError::FeatureNotFound(fid.to_string()))?;
        let feature = goal.feature_mut(fid).expect("find_feature_goal_mut located the owning goal");

        let result = feature.set_status(status, force);
        if let Some(note) = notes {
            feature.notes.push(note);
        }
        goal.recompute_status();

        match result {
            Ok(()) => {
                doc.record(ProgressEntry::new(agent, "update_feature_status", format!("{status:?}")).with_feature(fid));
                self.flush(&mut doc).await
            }
            Err(e) => {
                doc.record(ProgressEntry::new(agent, "update_feature_status", format!("rejected: {e}")).with_feature(fid));
                self.flush(&mut doc).await?;
                Err(e)
            }
        }
    }

    /// §4.4 `add_test_result`: appends the result and lets `Feature` derive
    /// the new status (P6) rather than trusting the caller's intent.
    pub async fn add_test_result(&self, fid: &str, test_id: impl Into<String>, passed: bool, detail: Option<String>, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        let goal = doc.find_feature_goal_mut(fid).ok_or_else(|| MemoryError::FeatureNotFound(fid.to_string()))?;
        let feature = goal.feature_mut(fid).expect("find_feature_goal_mut located the owning goal");

        let test_id = test_id.into();
        feature.add_test_result(TestResult {
            test_id: test_id.clone(),
            passed,
            detail,
            recorded_at: Utc::now(),
        });
        goal.recompute_status();

        let outcome = if passed { "pass" } else { "fail" };
        doc.record(ProgressEntry::new(agent, format!("add_test_result:{test_id}"), outcome).with_feature(fid));
        self.flush(&mut doc).await
    }

    /// §4.4 `remove_goal`: cascades to features; `confirm=false` is a
    /// dry-run returning the number of features that would be removed.
    pub async fn remove_goal(&self, gid: &str, confirm: bool, agent: &str) -> Result<usize, MemoryError> {
        let mut doc = self.doc.lock().await;
        let goal = doc.goal(gid).ok_or_else(|| MemoryError::GoalNotFound(gid.to_string()))?;
        let count = goal.features.len();
        if !confirm {
            return Ok(count);
        }
        doc.goals.retain(|g| g.id != gid);
        doc.record(ProgressEntry::new(agent, "remove_goal", format!("removed {count} features")));
        self.flush(&mut doc).await?;
        Ok(count)
    }

    /// §4.4 `move_feature`: O(1) re-parenting between goals.
    pub async fn move_feature(&self, fid: &str, target_goal: &str, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        if doc.goal(target_goal).is_none() {
            return Err(MemoryError::GoalNotFound(target_goal.to_string()));
        }
        let source = doc.find_feature_goal_mut(fid).ok_or_else(|| MemoryError::FeatureNotFound(fid.to_string()))?;
        if source.id == target_goal {
            return Ok(());
        }
        let idx = source.features.iter().position(|f| f.id == fid).expect("find_feature_goal_mut located the owning goal");
        let feature = source.features.remove(idx);
        source.recompute_status();

        let target = doc.goal_mut(target_goal).expect("checked to exist above");
        target.features.push(feature);
        target.recompute_status();

        doc.record(ProgressEntry::new(agent, "move_feature", format!("-> {target_goal}")).with_feature(fid));
        self.flush(&mut doc).await
    }

    /// Free-form key/value state outside the Goal/Feature hierarchy
    /// (`memory.json`'s `state` map, §6).
    pub async fn set_state(&self, key: impl Into<String>, value: serde_json::Value, agent: &str) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        let key = key.into();
        doc.state.insert(key.clone(), value);
        doc.record(ProgressEntry::new(agent, "set_state", "ok").with_feature(key));
        self.flush(&mut doc).await
    }

    pub async fn log_progress(&self, entry: ProgressEntry) -> Result<(), MemoryError> {
        let mut doc = self.doc.lock().await;
        doc.record(entry);
        self.flush(&mut doc).await
    }

    // -- persistence ----------------------------------------------------------

    /// Write `memory.json` atomically, rotate a backup snapshot, and append
    /// the newest progress entry to `progress.log` (I5: every mutation
    /// produces a log line).
    async fn flush(&self, doc: &mut DomainMemory) -> Result<(), MemoryError> {
        std::fs::create_dir_all(&self.paths.root).map_err(|e| MemoryError::StorageIo(e.to_string()))?;

        self.backup_existing()?;

        let tmp = self.paths.memory_json().with_extension("json.tmp");
        let json = serde_json::to_string_pretty(&*doc).map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        std::fs::write(&tmp, json).map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        std::fs::rename(&tmp, self.paths.memory_json()).map_err(|e| MemoryError::StorageIo(e.to_string()))?;

        if let Some(entry) = doc.progress.last() {
            self.append_progress_line(entry)?;
        }
        Ok(())
    }

    /// Copy the current `memory.json` into `backups/` before overwriting it,
    /// keeping only the most recent `MAX_BACKUPS` snapshots.
    fn backup_existing(&self) -> Result<(), MemoryError> {
        let current = self.paths.memory_json();
        if !current.exists() {
            return Ok(());
        }
        let backups = self.paths.backups_dir();
        std::fs::create_dir_all(&backups).map_err(|e| MemoryError::StorageIo(e.to_string()))?;

        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.f");
        let snapshot = backups.join(format!("memory-{stamp}.json"));
        std::fs::copy(&current, &snapshot).map_err(|e| MemoryError::StorageIo(e.to_string()))?;

        let mut existing: Vec<_> = std::fs::read_dir(&backups)
            .map_err(|e| MemoryError::StorageIo(e.to_string()))?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        existing.sort();
        if existing.len() > MAX_BACKUPS {
            for stale in &existing[..existing.len() - MAX_BACKUPS] {
                let _ = std::fs::remove_file(stale);
            }
        }
        Ok(())
    }

    fn append_progress_line(&self, entry: &ProgressEntry) -> Result<(), MemoryError> {
        use std::io::Write;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.paths.progress_log())
            .map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        writeln!(file, "{}", entry.to_log_line()).map_err(|e| MemoryError::StorageIo(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> MemoryStore {
        MemoryStore::new(dir, Uuid::nil(), "testdomain", "a test session")
    }

    #[tokio::test]
    async fn add_goal_then_feature_persists_and_logs() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "ship the thing"), "initializer").await.unwrap();
        store.add_feature("g1", Feature::new("f1", "write the code"), "initializer").await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(snap.goals.len(), 1);
        assert_eq!(snap.goals[0].features.len(), 1);
        assert_eq!(snap.progress.len(), 2);

        let paths = SessionPaths::new(dir.path(), "testdomain", Uuid::nil());
        assert!(paths.memory_json().exists());
        let log = std::fs::read_to_string(paths.progress_log()).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn duplicate_goal_id_is_rejected() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "first"), "agent").await.unwrap();
        let err = store.add_goal(Goal::new("g1", "dup"), "agent").await.unwrap_err();
        assert!(matches!(err, MemoryError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn completed_with_failing_test_is_rejected_unless_forced() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "goal"), "agent").await.unwrap();
        store.add_feature("g1", Feature::new("f1", "feature"), "agent").await.unwrap();
        store.add_test_result("f1", "t1", false, None, "agent").await.unwrap();

        let err = store.update_feature_status("f1", FeatureStatus::Completed, None, false, "agent").await.unwrap_err();
        assert!(matches!(err, MemoryError::InvariantViolation(_)));

        store.update_feature_status("f1", FeatureStatus::Completed, None, true, "agent").await.unwrap();
        let snap = store.snapshot().await;
        assert_eq!(snap.goals[0].features[0].status, FeatureStatus::Completed);
    }

    #[tokio::test]
    async fn add_test_result_derives_status_without_completing() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "goal"), "agent").await.unwrap();
        store.add_feature("g1", Feature::new("f1", "feature"), "agent").await.unwrap();
        store.add_test_result("f1", "t1", true, None, "agent").await.unwrap();

        let snap = store.snapshot().await;
        assert_eq!(snap.goals[0].features[0].status, FeatureStatus::InProgress);
    }

    #[tokio::test]
    async fn remove_goal_dry_run_does_not_mutate() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "goal"), "agent").await.unwrap();
        store.add_feature("g1", Feature::new("f1", "feature"), "agent").await.unwrap();

        let count = store.remove_goal("g1", false, "agent").await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(store.snapshot().await.goals.len(), 1);

        store.remove_goal("g1", true, "agent").await.unwrap();
        assert!(store.snapshot().await.goals.is_empty());
    }

    #[tokio::test]
    async fn move_feature_reparents_in_place() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "goal one"), "agent").await.unwrap();
        store.add_goal(Goal::new("g2", "goal two"), "agent").await.unwrap();
        store.add_feature("g1", Feature::new("f1", "feature"), "agent").await.unwrap();

        store.move_feature("f1", "g2", "agent").await.unwrap();
        let snap = store.snapshot().await;
        assert!(snap.goal("g1").unwrap().features.is_empty());
        assert_eq!(snap.goal("g2").unwrap().features.len(), 1);
    }

    #[tokio::test]
    async fn backups_are_capped_at_max() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.add_goal(Goal::new("g1", "goal"), "agent").await.unwrap();
        for i in 0..(MAX_BACKUPS + 5) {
            store.set_state(format!("k{i}"), serde_json::json!(i), "agent").await.unwrap();
        }
        let paths = SessionPaths::new(dir.path(), "testdomain", Uuid::nil());
        let backup_count = std::fs::read_dir(paths.backups_dir()).unwrap().count();
        assert!(backup_count <= MAX_BACKUPS);
    }

    #[tokio::test]
    async fn load_resumes_a_persisted_session() {
        let dir = tempdir().unwrap();
        {
            let store = store(dir.path());
            store.add_goal(Goal::new("g1", "goal"), "agent").await.unwrap();
        }
        let resumed = MemoryStore::load(dir.path(), "testdomain", Uuid::nil()).unwrap();
        assert_eq!(resumed.snapshot().await.goals.len(), 1);
    }
}
