//! Selects a primary model and ordered fallbacks for a task (§4.5).
//!
//! Generalizes the fixed `{haiku, sonnet, opus}` tier ladder
//! (`ModelRouter::select_model`, scored by `Complexity` alone) into a pool of
//! `(endpoint, model, concurrency)` entries scored per role by tier score,
//! critical-dimension floors, and a failure histogram — a
//! retry-escalation-by-tier idea turned into a per-(model, role) penalty here.

use std::collections::HashMap;

use crate::domain::error::RouterError;
use crate::domain::models::model_pool::{ModelPoolEntry, RoleRequirements};
use crate::domain::models::task::TaskTier;

/// Outcome reported back to the router after a task attempt (§4.5
/// "Feedback loop").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Success,
    EmptyResponse,
    ValidationFail,
    Error,
}

/// A scored routing decision: the primary model plus up to K fallbacks, all
/// satisfying the same role requirements (P10).
#[derive(Debug, Clone)]
pub struct RouteSelection {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

/// Keys the failure histogram by `(model, role)`.
type HistogramKey = (String, String);

/// Empirical per-model, per-role failure counts used as a ranking penalty.
#[derive(Debug, Clone, Default)]
pub struct FailureHistogram {
    counts: HashMap<HistogramKey, u32>,
}

impl FailureHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, model: &str, role: &str, outcome: RouteOutcome) {
        if outcome == RouteOutcome::Success {
            self.counts.remove(&(model.to_string(), role.to_string()));
            return;
        }
        *self
            .counts
            .entry((model.to_string(), role.to_string()))
            .or_insert(0) += 1;
    }

    fn penalty(&self, model: &str, role: &str) -> f64 {
        let failures = self
            .counts
            .get(&(model.to_string(), role.to_string()))
            .copied()
            .unwrap_or(0);
        f64::from(failures) * 0.05
    }
}

/// Estimate a task's tier from keywords in its description (§4.5
/// "Task-tier heuristic").
pub fn estimate_tier(description: &str) -> TaskTier {
    TaskTier::estimate(description)
}

/// The pool of configured model endpoints plus the shared failure
/// histogram (§5: "process-global and mutex-protected (brief critical
/// sections)" — held in `tokio::sync::Mutex` by the owning `Session`).
pub struct ModelRouter {
    pool: Vec<(String, ModelPoolEntry)>,
    histogram: FailureHistogram,
}

impl ModelRouter {
    pub fn new(pool: Vec<(String, ModelPoolEntry)>) -> Self {
        Self { pool, histogram: FailureHistogram::new() }
    }

    pub fn record(&mut self, model: &str, role: &str, outcome: RouteOutcome) {
        self.histogram.record(model, role, outcome);
    }

    /// Select primary + up to `fallback_count` fallbacks for `role` at
    /// `tier`, all satisfying `requirements` (§4.5 rules 1-3).
    pub fn select(
        &self,
        role: &str,
        tier: TaskTier,
        requirements: &RoleRequirements,
        fallback_count: usize,
    ) -> Result<RouteSelection, RouterError> {
        let tier_num = tier as u8;
        if tier_num < requirements.min_tier {
            return Err(RouterError::NoEligibleModel {
                role: role.to_string(),
                tier: tier_num,
            });
        }

        let mut eligible: Vec<(&str, &ModelPoolEntry, f64)> = self
            .pool
            .iter()
            .filter_map(|(name, entry)| {
                let score = scored(entry, tier_num, requirements);
                eligible_check(entry, tier_num, requirements)
                    .then(|| (name.as_str(), entry, score - self.histogram.penalty(name, role)))
            })
            .collect();

        if eligible.is_empty() {
            return Err(RouterError::NoEligibleModel {
                role: role.to_string(),
                tier: tier_num,
            });
        }

        // Rank: score desc, then important-dimension sum desc, then lower
        // historical latency (§4.5 rule 3).
        eligible.sort_by(|(_, a, score_a), (_, b, score_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.important_sum()
                        .partial_cmp(&a.important_sum())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| {
                    a.historical_latency_ms
                        .partial_cmp(&b.historical_latency_ms)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        let primary = eligible[0].0.to_string();
        let fallbacks = eligible
            .iter()
            .skip(1)
            .take(fallback_count)
            .map(|(name, _, _)| name.to_string())
            .collect();

        Ok(RouteSelection { primary, fallbacks })
    }
}

fn eligible_check(entry: &ModelPoolEntry, tier: u8, requirements: &RoleRequirements) -> bool {
    if scored(entry, tier, requirements) < requirements.min_score {
        return false;
    }
    requirements
        .critical_dimensions
        .iter()
        .all(|dim| entry.critical_dimensions.get(dim).copied().unwrap_or(0.0) > requirements.critical_floor)
}

/// `0.6 * tier_score + 0.4 * mean(critical_dimensions)`, with a 30% penalty
/// for small-parameter models on tier 3 (§4.5).
fn scored(entry: &ModelPoolEntry, tier: u8, requirements: &RoleRequirements) -> f64 {
    let _ = requirements;
    let mut score = 0.6 * entry.tier_score(tier) + 0.4 * entry.mean_critical();
    if tier == 3 && entry.small_parameter {
        score *= 0.7;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    fn entry(tier_score: f64, small: bool) -> ModelPoolEntry {
        let mut tier_scores = Map::new();
        tier_scores.insert(1, tier_score);
        tier_scores.insert(2, tier_score);
        tier_scores.insert(3, tier_score);
        ModelPoolEntry {
            url: "http://local".to_string(),
            model: "m".to_string(),
            max_concurrent: 1,
            tier_scores,
            critical_dimensions: Map::from([("reliability".to_string(), 0.9)]),
            important_dimensions: Map::new(),
            historical_latency_ms: 100.0,
            small_parameter: small,
        }
    }

    fn requirements() -> RoleRequirements {
        RoleRequirements {
            min_score: 0.0,
            min_tier: 1,
            critical_dimensions: vec!["reliability".to_string()],
            important_dimensions: vec![],
            critical_floor: 0.5,
        }
    }

    #[test]
    fn selects_highest_scoring_primary() {
        let router = ModelRouter::new(vec![
            ("weak".to_string(), entry(0.3, false)),
            ("strong".to_string(), entry(0.9, false)),
        ]);
        let selection = router
            .select("READER", TaskTier::Tier1, &requirements(), 2)
            .unwrap();
        assert_eq!(selection.primary, "strong");
        assert_eq!(selection.fallbacks, vec!["weak".to_string()]);
    }

    #[test]
    fn small_parameter_model_penalized_on_tier_three() {
        let router = ModelRouter::new(vec![
            ("small".to_string(), entry(0.9, true)),
            ("big".to_string(), entry(0.8, false)),
        ]);
        let selection = router
            .select("CODER", TaskTier::Tier3, &requirements(), 1)
            .unwrap();
        assert_eq!(selection.primary, "big");
    }

    #[test]
    fn no_eligible_model_below_critical_floor() {
        let mut low = entry(0.9, false);
        low.critical_dimensions.insert("reliability".to_string(), 0.1);
        let router = ModelRouter::new(vec![("only".to_string(), low)]);
        let err = router
            .select("READER", TaskTier::Tier1, &requirements(), 1)
            .unwrap_err();
        assert!(matches!(err, RouterError::NoEligibleModel { .. }));
    }

    #[test]
    fn failure_history_demotes_a_model() {
        let mut router = ModelRouter::new(vec![
            ("a".to_string(), entry(0.8, false)),
            ("b".to_string(), entry(0.79, false)),
        ]);
        // Repeated failures for "a" should drop it below "b".
        for _ in 0..5 {
            router.record("a", "READER", RouteOutcome::EmptyResponse);
        }
        let selection = router
            .select("READER", TaskTier::Tier1, &requirements(), 1)
            .unwrap();
        assert_eq!(selection.primary, "b");
    }
}
