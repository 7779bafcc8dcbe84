use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use studykit_core::{
    train_test_split, Dataset, MlError, MlResult, RecordStore, UserFeatureProfile,
};
use studykit_models::{DecisionTreeRegressor, LinearRegression, SupervisedModel};
use studykit_numeric::{mean, pearson_correlation, std_dev, RegressionMetrics};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub test_size: f64,
    /// Users younger than this many days are excluded from training data.
    pub min_tenure_days: f64,
    /// Scores above this count as "engaged" for the binary metrics.
    pub binary_threshold: f64,
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            test_size: 0.25,
            min_tenure_days: 7.0,
            binary_threshold: 50.0,
            seed: Some(42),
        }
    }
}

/// Prepared training data with its column names and provenance.
#[derive(Debug, Clone)]
pub struct TrainingFrame {
    pub dataset: Dataset,
    pub feature_names: Vec<&'static str>,
    pub user_ids: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    /// Binarize both sides at `threshold` and compute the usual quartet.
    /// Degenerate denominators yield 0.0 rather than NaN.
    pub fn at_threshold(actual: &[f64], predicted: &[f64], threshold: f64) -> Self {
        let mut tp = 0usize;
        let mut tn = 0usize;
        let mut fp = 0usize;
        let mut fn_ = 0usize;
        for (&a, &p) in actual.iter().zip(predicted.iter()) {
            match (a > threshold, p > threshold) {
                (true, true) => tp += 1,
                (false, false) => tn += 1,
                (false, true) => fp += 1,
                (true, false) => fn_ += 1,
            }
        }
        let total = (tp + tn + fp + fn_) as f64;
        let accuracy = if total > 0.0 { (tp + tn) as f64 / total } else { 0.0 };
        let precision =
            if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ClassificationMetrics { accuracy, precision, recall, f1 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub regression: RegressionMetrics,
    pub classification: ClassificationMetrics,
    /// Normalized |Pearson| per feature column, descending.
    pub feature_importance: Vec<(String, f64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossValidationReport {
    pub folds: usize,
    pub fold_metrics: Vec<RegressionMetrics>,
    pub mean_mse: f64,
    pub std_mse: f64,
    pub mean_r_squared: f64,
}

/// Hyperparameter sweep for the decision-tree variant. The default space is
/// 3 × 3 × 3 = 27 combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchSpace {
    pub max_depths: Vec<usize>,
    pub min_samples_splits: Vec<usize>,
    pub min_samples_leaves: Vec<usize>,
}

impl Default for GridSearchSpace {
    fn default() -> Self {
        GridSearchSpace {
            max_depths: vec![2, 4, 6],
            min_samples_splits: vec![2, 4, 8],
            min_samples_leaves: vec![1, 2, 4],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GridPoint {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub mean_r_squared: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridSearchReport {
    pub evaluated: Vec<GridPoint>,
    pub best: GridPoint,
}

/// End-to-end training and evaluation for the engagement model.
///
/// Training labels are computed by `ground_truth_score`, which deliberately
/// does NOT match the live scoring rule in `studykit-engagement`: the label
/// weighting tracks observed retention, the live rule tracks the product
/// formula. Keep the two separate; see DESIGN.md before changing either.
#[derive(Debug, Clone)]
pub struct ModelTrainer {
    config: TrainerConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        ModelTrainer { config }
    }

    /// Build the training frame from raw records. Users with less than
    /// `min_tenure_days` of tenure or no sessions at all are excluded.
    pub fn prepare_dataset(
        &self,
        store: &RecordStore<'_>,
        now: DateTime<Utc>,
    ) -> MlResult<TrainingFrame> {
        let mut rows = Vec::new();
        let mut targets = Vec::new();
        let mut user_ids = Vec::new();

        for user in store.users {
            let profile = store.profile_for(user, now);
            if profile.tenure_days < self.config.min_tenure_days {
                continue;
            }
            if !store.sessions.iter().any(|s| s.user_id == user.id) {
                continue;
            }
            rows.push(profile.as_features());
            targets.push(ground_truth_score(&profile));
            user_ids.push(user.id);
        }

        if rows.is_empty() {
            return Err(MlError::InsufficientData { required: 1, got: 0 });
        }
        info!(rows = rows.len(), "prepared engagement training frame");

        Ok(TrainingFrame {
            dataset: Dataset::new(rows, targets)?,
            feature_names: UserFeatureProfile::FEATURE_NAMES.to_vec(),
            user_ids,
        })
    }

    /// Split, fit a linear model, and report regression + thresholded
    /// classification metrics and feature importance.
    pub fn train_and_evaluate(
        &self,
        store: &RecordStore<'_>,
        now: DateTime<Utc>,
    ) -> MlResult<TrainingReport> {
        let frame = self.prepare_dataset(store, now)?;
        let (train, test) =
            train_test_split(&frame.dataset, self.config.test_size, self.config.seed)?;

        let mut model = LinearRegression::new();
        model.fit(&train)?;

        let mut predicted = Vec::with_capacity(test.len());
        for row in test.features() {
            predicted.push(model.predict(row)?);
        }
        let regression = model.evaluate(&test)?;
        let classification = ClassificationMetrics::at_threshold(
            test.targets(),
            &predicted,
            self.config.binary_threshold,
        );

        Ok(TrainingReport {
            rows: frame.dataset.len(),
            train_rows: train.len(),
            test_rows: test.len(),
            regression,
            classification,
            feature_importance: feature_importance(&frame),
        })
    }

    /// K-fold cross-validation of the linear model over the prepared frame.
    pub fn cross_validate(
        &self,
        store: &RecordStore<'_>,
        k: usize,
        now: DateTime<Utc>,
    ) -> MlResult<CrossValidationReport> {
        if k < 2 {
            return Err(MlError::InvalidOperation(format!(
                "cross-validation needs k >= 2, got {k}"
            )));
        }
        let frame = self.prepare_dataset(store, now)?;
        let folds = fold_indices(frame.dataset.len(), k, self.config.seed)?;

        let mut fold_metrics = Vec::with_capacity(k);
        for fold in &folds {
            let test = frame.dataset.subset(fold)?;
            let train_idx: Vec<usize> = (0..frame.dataset.len())
                .filter(|i| !fold.contains(i))
                .collect();
            let train = frame.dataset.subset(&train_idx)?;

            let mut model = LinearRegression::new();
            model.fit(&train)?;
            fold_metrics.push(model.evaluate(&test)?);
        }

        let mses: Vec<f64> = fold_metrics.iter().map(|m| m.mse).collect();
        let r2s: Vec<f64> = fold_metrics.iter().map(|m| m.r_squared).collect();
        Ok(CrossValidationReport {
            folds: k,
            mean_mse: mean(&mses),
            std_mse: std_dev(&mses),
            mean_r_squared: mean(&r2s),
            fold_metrics,
        })
    }

    /// Brute-force sweep over the tree hyperparameter grid; every combination
    /// is retrained from scratch with 3-fold CV. Combinations run in
    /// parallel.
    pub fn grid_search(
        &self,
        store: &RecordStore<'_>,
        space: &GridSearchSpace,
        now: DateTime<Utc>,
    ) -> MlResult<GridSearchReport> {
        let frame = self.prepare_dataset(store, now)?;
        let folds = fold_indices(frame.dataset.len(), 3, self.config.seed)?;

        let mut combos = Vec::new();
        for &depth in &space.max_depths {
            for &split in &space.min_samples_splits {
                for &leaf in &space.min_samples_leaves {
                    combos.push((depth, split, leaf));
                }
            }
        }

        let evaluated: Vec<GridPoint> = combos
            .par_iter()
            .map(|&(max_depth, min_samples_split, min_samples_leaf)| {
                let mut r2s = Vec::with_capacity(folds.len());
                for fold in &folds {
                    let result = (|| -> MlResult<f64> {
                        let test = frame.dataset.subset(fold)?;
                        let train_idx: Vec<usize> = (0..frame.dataset.len())
                            .filter(|i| !fold.contains(i))
                            .collect();
                        let train = frame.dataset.subset(&train_idx)?;

                        let mut model =
                            DecisionTreeRegressor::new(max_depth, min_samples_split)
                                .with_min_samples_leaf(min_samples_leaf);
                        model.fit(&train)?;
                        Ok(model.evaluate(&test)?.r_squared)
                    })();
                    // A failed fold scores as unusable, not as a crash.
                    r2s.push(result.unwrap_or(f64::NEG_INFINITY));
                }
                GridPoint {
                    max_depth,
                    min_samples_split,
                    min_samples_leaf,
                    mean_r_squared: mean(&r2s),
                }
            })
            .collect();

        let best = *evaluated
            .iter()
            .max_by(|a, b| {
                a.mean_r_squared
                    .partial_cmp(&b.mean_r_squared)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .ok_or(MlError::EmptyInput)?;

        Ok(GridSearchReport { evaluated, best })
    }
}

/// Retention-oriented label formula. Intentionally different weighting from
/// the live engagement scoring rule.
pub fn ground_truth_score(profile: &UserFeatureProfile) -> f64 {
    let frequency = (profile.session_frequency / 7.0).min(1.0);
    let completion = profile.mean_completion.clamp(0.0, 1.0);
    let goals = profile.goal_completion_rate.clamp(0.0, 1.0);
    let recency = profile.recency_factor();

    (30.0 * recency + 30.0 * frequency + 25.0 * completion + 15.0 * goals).clamp(0.0, 100.0)
}

/// Naive correlation-based importance: |Pearson(feature, target)| per column,
/// normalized to sum to 1, descending.
fn feature_importance(frame: &TrainingFrame) -> Vec<(String, f64)> {
    let n_features = frame.dataset.n_features();
    let targets = frame.dataset.targets();

    let mut raw = Vec::with_capacity(n_features);
    for col in 0..n_features {
        let column: Vec<f64> =
            frame.dataset.features().iter().map(|row| row[col]).collect();
        let name = frame
            .feature_names
            .get(col)
            .copied()
            .unwrap_or("unknown")
            .to_string();
        raw.push((name, pearson_correlation(&column, targets).abs()));
    }

    let total: f64 = raw.iter().map(|(_, v)| v).sum();
    if total > 0.0 {
        for (_, v) in raw.iter_mut() {
            *v /= total;
        }
    }
    raw.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    raw
}

/// Seeded shuffled fold assignment; every row lands in exactly one fold.
fn fold_indices(n: usize, k: usize, seed: Option<u64>) -> MlResult<Vec<Vec<usize>>> {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    if n < k {
        return Err(MlError::InsufficientData { required: k, got: n });
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    indices.shuffle(&mut rng);

    let mut folds = vec![Vec::new(); k];
    for (i, idx) in indices.into_iter().enumerate() {
        folds[i % k].push(idx);
    }
    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use studykit_core::{AcademicLevel, SessionRecord, UserRecord};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
    }

    fn user(id: u64, tenure_days: i64) -> UserRecord {
        UserRecord {
            id,
            academic_level: AcademicLevel::Undergraduate,
            subjects: vec!["math".into()],
            availability: vec![],
            timezone_offset_minutes: 0,
            created_at: now() - Duration::days(tenure_days),
        }
    }

    fn session(user_id: u64, days_ago: i64, completion: f64) -> SessionRecord {
        SessionRecord {
            user_id,
            subject: "math".into(),
            started_at: now() - Duration::days(days_ago),
            duration_minutes: 45,
            completion,
            focus: None,
        }
    }

    /// A cohort with varied activity so the frame has signal.
    fn cohort() -> (Vec<UserRecord>, Vec<SessionRecord>) {
        let mut users = Vec::new();
        let mut sessions = Vec::new();
        for id in 1..=24u64 {
            users.push(user(id, 60));
            // Users differ in cadence and quality.
            let every = 1 + (id % 4) as i64;
            let quality = 0.3 + 0.03 * (id % 20) as f64;
            for d in (0..28).step_by(every as usize) {
                sessions.push(session(id, d, quality));
            }
        }
        (users, sessions)
    }

    #[test]
    fn test_prepare_filters_new_and_inactive_users() {
        let mut users = vec![user(1, 60), user(2, 2), user(3, 60)];
        let sessions = vec![session(1, 1, 0.8), session(2, 1, 0.8)];
        users.push(user(4, 60)); // tenured but no sessions
        let store = RecordStore {
            users: &users,
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };

        let trainer = ModelTrainer::new(TrainerConfig::default());
        let frame = trainer.prepare_dataset(&store, now()).unwrap();
        // Only user 1 passes both filters (user 3 has no sessions either).
        assert_eq!(frame.user_ids, vec![1]);
    }

    #[test]
    fn test_train_and_evaluate_reports() {
        let (users, sessions) = cohort();
        let store = RecordStore {
            users: &users,
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };

        let trainer = ModelTrainer::new(TrainerConfig::default());
        let report = trainer.train_and_evaluate(&store, now()).unwrap();

        assert_eq!(report.rows, 24);
        assert_eq!(report.train_rows + report.test_rows, 24);
        assert!(report.regression.mse >= 0.0);
        assert!((0.0..=1.0).contains(&report.classification.accuracy));
        assert_eq!(
            report.feature_importance.len(),
            UserFeatureProfile::FEATURE_NAMES.len()
        );
        let importance_sum: f64 =
            report.feature_importance.iter().map(|(_, v)| v).sum();
        assert!((importance_sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cross_validate_covers_all_rows() {
        let (users, sessions) = cohort();
        let store = RecordStore {
            users: &users,
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };

        let trainer = ModelTrainer::new(TrainerConfig::default());
        let report = trainer.cross_validate(&store, 4, now()).unwrap();
        assert_eq!(report.folds, 4);
        assert_eq!(report.fold_metrics.len(), 4);
        assert!(report.mean_mse >= 0.0);
    }

    #[test]
    fn test_grid_search_sweeps_full_space() {
        let (users, sessions) = cohort();
        let store = RecordStore {
            users: &users,
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };

        let trainer = ModelTrainer::new(TrainerConfig::default());
        let report =
            trainer.grid_search(&store, &GridSearchSpace::default(), now()).unwrap();

        assert_eq!(report.evaluated.len(), 27);
        let best = report.best;
        assert!(report
            .evaluated
            .iter()
            .all(|p| p.mean_r_squared <= best.mean_r_squared));
    }

    #[test]
    fn test_label_formula_differs_from_live_scoring() {
        // Social signals move the live score but not the training label.
        let (users, sessions) = cohort();
        let store = RecordStore {
            users: &users,
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };
        let profile = store.profile_for(&users[0], now());
        let label = ground_truth_score(&profile);
        assert!((0.0..=100.0).contains(&label));
    }
}
