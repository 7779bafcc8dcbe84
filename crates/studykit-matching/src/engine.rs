use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use studykit_core::{MlResult, RecordStore, ScoreSource, UserRecord};
use studykit_models::{KnnRegressor, SupervisedModel};

use crate::features::{pair_features, PairSignals};

/// Tunables for the matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Partnerships with observed outcomes required before the model path is
    /// used at all. Below this, training is skipped entirely.
    pub min_training_partnerships: usize,
    pub model_k: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        MatchingConfig { min_training_partnerships: 10, model_k: 3 }
    }
}

/// One scored candidate pairing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub user_id: u64,
    pub candidate_id: u64,
    /// Compatibility in [0, 1].
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub source: ScoreSource,
}

/// Predicts study-partner compatibility from historical partnership outcomes,
/// falling back to a rule-based compatibility formula whenever no trained
/// model is available or anything goes wrong. Scoring never fails: a caller
/// always gets a usable result.
#[derive(Debug, Clone)]
pub struct PartnerMatchingEngine {
    config: MatchingConfig,
    model: KnnRegressor,
    trained: bool,
    training_rows: usize,
}

impl PartnerMatchingEngine {
    pub fn new(config: MatchingConfig) -> Self {
        let model = KnnRegressor::new(config.model_k);
        PartnerMatchingEngine { config, model, trained: false, training_rows: 0 }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Fit the outcome model from partnerships with observed outcomes.
    ///
    /// Returns `true` when a model was actually trained; with fewer than
    /// `min_training_partnerships` usable rows, training is skipped (not an
    /// error) and scoring stays rule-based.
    pub fn train(&mut self, store: &RecordStore<'_>, now: DateTime<Utc>) -> bool {
        match self.try_train(store, now) {
            Ok(trained) => trained,
            Err(e) => {
                warn!(error = %e, "partner matching training failed; staying rule-based");
                false
            }
        }
    }

    fn try_train(&mut self, store: &RecordStore<'_>, now: DateTime<Utc>) -> MlResult<bool> {
        let mut rows = Vec::new();
        let mut targets = Vec::new();

        for p in store.partnerships {
            let outcome = match p.outcome {
                Some(o) => o,
                None => continue,
            };
            let (Some(a), Some(b)) = (store.user(p.user_a), store.user(p.user_b)) else {
                continue;
            };
            let pa = store.profile_for(a, now);
            let pb = store.profile_for(b, now);
            let signals = PairSignals::compute(a, b, &pa, &pb);
            rows.push(pair_features(&pa, &pb, &signals));
            targets.push(outcome.clamp(0.0, 1.0));
        }

        if rows.len() < self.config.min_training_partnerships {
            info!(
                usable = rows.len(),
                required = self.config.min_training_partnerships,
                "too few partnership outcomes; skipping matcher training"
            );
            return Ok(false);
        }

        let dataset = studykit_core::Dataset::new(rows, targets)?;
        self.model.fit(&dataset)?;
        self.training_rows = dataset.len();
        self.trained = true;
        Ok(true)
    }

    /// Score one candidate pair. Fail-open: internal errors degrade to the
    /// rule-based score, never to an error result.
    pub fn score_pair(
        &self,
        store: &RecordStore<'_>,
        user_id: u64,
        candidate_id: u64,
        now: DateTime<Utc>,
    ) -> MatchResult {
        let (Some(a), Some(b)) = (store.user(user_id), store.user(candidate_id)) else {
            warn!(user_id, candidate_id, "matching requested for unknown user");
            return MatchResult {
                user_id,
                candidate_id,
                score: 0.5,
                confidence: 0.1,
                reasons: vec!["Insufficient data for this pairing".to_string()],
                source: ScoreSource::Fallback,
            };
        };

        let pa = store.profile_for(a, now);
        let pb = store.profile_for(b, now);
        let signals = PairSignals::compute(a, b, &pa, &pb);
        let reasons = describe(&signals, a, b);

        if self.trained {
            match self.model.predict(&pair_features(&pa, &pb, &signals)) {
                Ok(raw) => {
                    return MatchResult {
                        user_id,
                        candidate_id,
                        score: raw.clamp(0.0, 1.0),
                        confidence: 0.5 + (self.training_rows as f64 / 50.0).min(0.4),
                        reasons,
                        source: ScoreSource::Model,
                    };
                }
                Err(e) => {
                    warn!(
                        user_id,
                        candidate_id,
                        error = %e,
                        "matcher model prediction failed; using rule-based score"
                    );
                }
            }
        }

        MatchResult {
            user_id,
            candidate_id,
            score: rule_score(&signals),
            confidence: 0.5,
            reasons,
            source: ScoreSource::Fallback,
        }
    }

    /// Score and rank candidates for a user, best first. Non-empty whenever
    /// `candidates` contains at least one id other than the user's own,
    /// regardless of training state.
    pub fn rank_candidates(
        &self,
        store: &RecordStore<'_>,
        user_id: u64,
        candidates: &[u64],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = candidates
            .iter()
            .filter(|&&c| c != user_id)
            .map(|&c| self.score_pair(store, user_id, c, now))
            .collect();
        results.sort_by(|x, y| {
            y.score.partial_cmp(&x.score).unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        results
    }
}

/// Deterministic fallback: weighted compatibility over the pairwise signals.
/// Weights sum to 1.0 so the score stays in [0, 1].
fn rule_score(s: &PairSignals) -> f64 {
    0.25 * s.subject_overlap
        + 0.20 * s.availability_overlap
        + 0.125 * s.academic_proximity
        + 0.10 * s.timezone_proximity
        + 0.10 * s.rhythm_similarity
        + 0.075 * s.rating_synergy
        + 0.075 * s.frequency_balance
        + 0.075 * s.completion_pair
}

fn describe(s: &PairSignals, a: &UserRecord, b: &UserRecord) -> Vec<String> {
    let mut reasons = Vec::new();
    if s.subject_overlap >= 0.5 {
        reasons.push("Strong shared subject interest".to_string());
    } else if s.subject_overlap > 0.0 {
        reasons.push("Some shared subjects".to_string());
    }
    if s.availability_overlap >= 0.2 {
        reasons.push("Weekly schedules overlap".to_string());
    }
    if s.academic_proximity >= 0.7 {
        reasons.push("Similar academic level".to_string());
    }
    if s.timezone_proximity >= 0.9 {
        reasons.push("Same or nearby timezone".to_string());
    }
    if s.rhythm_similarity >= 0.5 {
        reasons.push("Similar daily study rhythm".to_string());
    }
    if reasons.is_empty() {
        reasons.push(format!(
            "General compatibility between {} and {}",
            a.id, b.id
        ));
    }
    reasons
}
