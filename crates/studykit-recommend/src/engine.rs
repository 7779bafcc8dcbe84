use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use studykit_core::{
    ContentRecord, ContentType, Dataset, InteractionRecord, MlResult, MultiDataset, ScoreSource,
    UserRecord,
};
use studykit_models::{KnnRegressor, MultiLayerPerceptron, SupervisedModel};
use studykit_numeric::Activation;

use crate::features::{popularity, scoring_features, TasteProfile, SCORING_FEATURE_LEN};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    /// Interactions required before the model path is trained.
    pub min_training_interactions: usize,
    pub knn_k: usize,
    pub mlp_hidden: usize,
    pub seed: Option<u64>,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        RecommenderConfig {
            min_training_interactions: 50,
            knn_k: 5,
            mlp_hidden: 8,
            seed: Some(42),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecommendation {
    pub content_id: u64,
    pub title: String,
    /// Predicted preference in [0, 1].
    pub score: f64,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub source: ScoreSource,
}

/// Recommends study content by blending a KNN collaborative pass with an MLP
/// content-scoring pass, then applying a two-pass diversity filter. Always
/// returns a non-empty list for a non-empty catalog: with no trained model
/// (or on any internal error) a deterministic affinity-and-popularity
/// fallback ranking takes over.
#[derive(Debug, Clone)]
pub struct ContentRecommendationEngine {
    config: RecommenderConfig,
    knn: KnnRegressor,
    mlp: Option<MultiLayerPerceptron>,
    trained: bool,
    training_rows: usize,
}

impl ContentRecommendationEngine {
    pub fn new(config: RecommenderConfig) -> Self {
        let knn = KnnRegressor::new(config.knn_k);
        ContentRecommendationEngine { config, knn, mlp: None, trained: false, training_rows: 0 }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Train both passes from the interaction log. Skipped below
    /// `min_training_interactions`.
    pub fn train(
        &mut self,
        users: &[UserRecord],
        contents: &[ContentRecord],
        interactions: &[InteractionRecord],
    ) -> bool {
        match self.try_train(users, contents, interactions) {
            Ok(trained) => trained,
            Err(e) => {
                warn!(error = %e, "recommender training failed; staying rule-based");
                false
            }
        }
    }

    fn try_train(
        &mut self,
        users: &[UserRecord],
        contents: &[ContentRecord],
        interactions: &[InteractionRecord],
    ) -> MlResult<bool> {
        if interactions.len() < self.config.min_training_interactions {
            info!(
                interactions = interactions.len(),
                required = self.config.min_training_interactions,
                "too few interactions; skipping recommender training"
            );
            return Ok(false);
        }

        let mut rows = Vec::new();
        let mut targets = Vec::new();
        for user in users {
            let taste = TasteProfile::build(user, interactions, contents);
            for i in interactions.iter().filter(|i| i.user_id == user.id) {
                let Some(content) = contents.iter().find(|c| c.id == i.content_id) else {
                    continue;
                };
                rows.push(scoring_features(&taste, content));
                targets.push(i.signal());
            }
        }
        if rows.len() < self.config.min_training_interactions {
            info!(
                usable = rows.len(),
                "interactions did not resolve to catalog entries; skipping training"
            );
            return Ok(false);
        }

        let knn_data = Dataset::new(rows.clone(), targets.clone())?;
        self.knn.fit(&knn_data)?;

        let mlp_targets: Vec<Vec<f64>> = targets.iter().map(|&t| vec![t]).collect();
        let mlp_data = MultiDataset::new(rows, mlp_targets)?;
        let mut mlp = MultiLayerPerceptron::new(
            &[SCORING_FEATURE_LEN, self.config.mlp_hidden, 1],
            &[Activation::Relu, Activation::Sigmoid],
            self.config.seed,
        )?;
        mlp.fit(&mlp_data)?;
        self.mlp = Some(mlp);

        self.training_rows = knn_data.len();
        self.trained = true;
        Ok(true)
    }

    /// Recommend up to `limit` items for a user.
    pub fn recommend(
        &self,
        user: &UserRecord,
        contents: &[ContentRecord],
        interactions: &[InteractionRecord],
        limit: usize,
    ) -> Vec<ContentRecommendation> {
        if contents.is_empty() || limit == 0 {
            return Vec::new();
        }

        let taste = TasteProfile::build(user, interactions, contents);
        let seen_ids: HashSet<u64> = interactions
            .iter()
            .filter(|i| i.user_id == user.id)
            .map(|i| i.content_id)
            .collect();

        // Prefer unseen items; fall back to the full catalog when the user
        // has seen everything.
        let mut candidates: Vec<&ContentRecord> =
            contents.iter().filter(|c| !seen_ids.contains(&c.id)).collect();
        if candidates.is_empty() {
            candidates = contents.iter().collect();
        }

        let pop = popularity(interactions);
        let mut scored: Vec<(f64, ScoreSource, &ContentRecord)> = candidates
            .iter()
            .map(|&c| {
                let (score, source) = self.score_one(&taste, c, &pop, user);
                (score, source, c)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let picked = diversity_filter(&scored, &seen_combos(&seen_ids, contents), limit);

        picked
            .into_iter()
            .map(|(score, source, c)| ContentRecommendation {
                content_id: c.id,
                title: c.title.clone(),
                score,
                confidence: self.confidence(&taste),
                reasons: describe(&taste, c),
                source,
            })
            .collect()
    }

    /// Blend of the two model passes when trained; rule-based otherwise.
    /// Model failures degrade to the fallback score per item.
    fn score_one(
        &self,
        taste: &TasteProfile,
        content: &ContentRecord,
        pop: &std::collections::HashMap<u64, f64>,
        user: &UserRecord,
    ) -> (f64, ScoreSource) {
        if self.trained {
            let row = scoring_features(taste, content);
            let knn_score = self.knn.predict(&row);
            let mlp_score =
                self.mlp.as_ref().map(|m| m.predict(&row).map(|out| out[0]));
            match (knn_score, mlp_score) {
                (Ok(k), Some(Ok(m))) => {
                    return (((k + m) / 2.0).clamp(0.0, 1.0), ScoreSource::Model)
                }
                (Ok(k), _) => return (k.clamp(0.0, 1.0), ScoreSource::Model),
                (Err(e), _) => {
                    warn!(
                        user_id = user.id,
                        content_id = content.id,
                        error = %e,
                        "recommender model scoring failed; using fallback score"
                    );
                }
            }
        }
        (fallback_score(taste, content, pop, user), ScoreSource::Fallback)
    }

    fn confidence(&self, taste: &TasteProfile) -> f64 {
        let mut c = 0.3 + (taste.interaction_count as f64 / 50.0).min(0.3);
        if self.trained {
            c += 0.2 + (self.training_rows as f64 / 500.0).min(0.15);
        }
        c.min(0.95)
    }
}

/// (type, subject) combinations the user has already consumed.
fn seen_combos(
    seen_ids: &HashSet<u64>,
    contents: &[ContentRecord],
) -> HashSet<(ContentType, String)> {
    contents
        .iter()
        .filter(|c| seen_ids.contains(&c.id))
        .map(|c| (c.content_type, c.subject.clone()))
        .collect()
}

/// Two-pass selection over score-sorted candidates: first greedily take the
/// best item of each not-yet-seen (type, subject) combination, then backfill
/// with the remaining highest scorers up to `limit`.
fn diversity_filter<'a>(
    scored: &[(f64, ScoreSource, &'a ContentRecord)],
    seen: &HashSet<(ContentType, String)>,
    limit: usize,
) -> Vec<(f64, ScoreSource, &'a ContentRecord)> {
    let mut picked: Vec<(f64, ScoreSource, &ContentRecord)> = Vec::with_capacity(limit);
    let mut covered = seen.clone();
    let mut picked_ids: HashSet<u64> = HashSet::new();

    for &(score, source, c) in scored {
        if picked.len() >= limit {
            break;
        }
        let combo = (c.content_type, c.subject.clone());
        if !covered.contains(&combo) {
            covered.insert(combo);
            picked_ids.insert(c.id);
            picked.push((score, source, c));
        }
    }

    for &(score, source, c) in scored {
        if picked.len() >= limit {
            break;
        }
        if picked_ids.insert(c.id) {
            picked.push((score, source, c));
        }
    }

    picked
}

/// Deterministic fallback: subject affinity, difficulty fit against academic
/// level, and the global popularity prior. Weights sum to 1.0.
fn fallback_score(
    taste: &TasteProfile,
    content: &ContentRecord,
    pop: &std::collections::HashMap<u64, f64>,
    user: &UserRecord,
) -> f64 {
    let affinity = taste.subject_affinity(&content.subject);
    let difficulty_fit = 1.0 - (content.difficulty - user.academic_level.encoded()).abs();
    let popularity_prior = pop.get(&content.id).copied().unwrap_or(0.5);
    0.5 * affinity + 0.3 * difficulty_fit + 0.2 * popularity_prior
}

fn describe(taste: &TasteProfile, content: &ContentRecord) -> Vec<String> {
    let mut reasons = Vec::new();
    if taste.subject_affinity(&content.subject) >= 0.6 {
        reasons.push(format!("You have done well with {} content", content.subject));
    }
    let slot = crate::features::CONTENT_TYPES
        .iter()
        .position(|&t| t == content.content_type);
    if let Some(s) = slot {
        if taste.type_preference[s] >= 0.6 {
            reasons.push("Matches a content format you engage with".to_string());
        }
    }
    if reasons.is_empty() {
        reasons.push(format!("Broadens your coverage of {}", content.subject));
    }
    reasons
}
