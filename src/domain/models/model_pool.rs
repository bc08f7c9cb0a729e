//! Model pool domain model — the Router's view of available model
//! endpoints and their empirical scores (§3 `AgentDefinition`, §4.5).
//!
//! Generalizes the fixed `{haiku, sonnet, opus}` tier ladder
//! (`services/model_router.rs`) into a configurable pool of
//! `(endpoint, model, concurrency)` entries scored per dimension per tier.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One configured model endpoint (§6 `modelPool`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPoolEntry {
    pub url: String,
    pub model: String,
    pub max_concurrent: usize,
    /// Per-tier score, keyed by tier (1..=3), for each scored dimension.
    #[serde(default)]
    pub tier_scores: HashMap<u8, f64>,
    /// Critical dimensions this model must clear a floor on (e.g.
    /// "reliability", "instruction_following").
    #[serde(default)]
    pub critical_dimensions: HashMap<String, f64>,
    /// Secondary, tiebreaker-only dimensions.
    #[serde(default)]
    pub important_dimensions: HashMap<String, f64>,
    #[serde(default)]
    pub historical_latency_ms: f64,
    /// True for small (<7B parameter) local models — penalized 30% on
    /// tier-3 tasks (§4.5).
    #[serde(default)]
    pub small_parameter: bool,
}

impl ModelPoolEntry {
    pub fn tier_score(&self, tier: u8) -> f64 {
        self.tier_scores.get(&tier).copied().unwrap_or(0.0)
    }

    pub fn mean_critical(&self) -> f64 {
        if self.critical_dimensions.is_empty() {
            return 1.0;
        }
        self.critical_dimensions.values().sum::<f64>() / self.critical_dimensions.len() as f64
    }

    pub fn important_sum(&self) -> f64 {
        self.important_dimensions.values().sum()
    }
}

/// Per-role model requirements (§4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleRequirements {
    pub min_score: f64,
    pub min_tier: u8,
    pub critical_dimensions: Vec<String>,
    pub important_dimensions: Vec<String>,
    /// Floor each critical dimension must exceed.
    pub critical_floor: f64,
}

impl Default for RoleRequirements {
    fn default() -> Self {
        Self {
            min_score: 0.0,
            min_tier: 1,
            critical_dimensions: Vec::new(),
            important_dimensions: Vec::new(),
            critical_floor: 0.0,
        }
    }
}
