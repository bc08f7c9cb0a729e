//! Progress log entries — append-only record of domain memory mutations
//! (§3, I5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable progress-log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub ts: DateTime<Utc>,
    pub agent: String,
    pub action: String,
    pub outcome: String,
    #[serde(default)]
    pub feature_id: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
}

impl ProgressEntry {
    pub fn new(agent: impl Into<String>, action: impl Into<String>, outcome: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            agent: agent.into(),
            action: action.into(),
            outcome: outcome.into(),
            feature_id: None,
            artifacts: Vec::new(),
        }
    }

    pub fn with_feature(mut self, feature_id: impl Into<String>) -> Self {
        self.feature_id = Some(feature_id.into());
        self
    }

    /// Render as a single plain-text line for `progress.log` (§6).
    pub fn to_log_line(&self) -> String {
        let feature = self
            .feature_id
            .as_deref()
            .map(|f| format!(" feature={f}"))
            .unwrap_or_default();
        format!(
            "{} [{}] {} -> {}{}",
            self.ts.to_rfc3339(),
            self.agent,
            self.action,
            self.outcome,
            feature
        )
    }
}
