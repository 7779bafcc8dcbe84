use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use studykit_core::{Dataset, MlResult, RecordStore, ScoreSource, SessionRecord};
use studykit_models::{DecisionTreeRegressor, SupervisedModel};

use crate::patterns::StudyPatterns;

const CANDIDATE_DURATIONS: [u32; 5] = [30, 45, 60, 90, 120];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Sessions required before the quality model is trained.
    pub min_training_sessions: usize,
    pub tree_max_depth: usize,
    pub tree_min_samples_split: usize,
    pub ema_alpha: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            min_training_sessions: 20,
            tree_max_depth: 4,
            tree_min_samples_split: 4,
            ema_alpha: 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionKind {
    FocusedStudy,
    Practice,
    Review,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedSession {
    pub day_index: usize,
    pub start_hour: u8,
    pub duration_minutes: u32,
    pub subject: String,
    pub kind: SessionKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyPlanRecommendation {
    pub user_id: u64,
    pub optimal_duration_minutes: u32,
    pub best_start_hour: u8,
    pub sessions: Vec<PlannedSession>,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub source: ScoreSource,
}

/// What the caller wants planned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub days: usize,
    pub sessions_per_day: usize,
    pub subjects: Vec<String>,
}

/// Recommends session length, time of day and a week-style schedule from a
/// user's own session history.
///
/// A decision tree predicts session quality from (hour, duration, subject
/// affinity); mined habit patterns adjust the model's pick and drive the
/// fallback when no model is available. Schedule generation itself is a
/// plain round-robin over subjects and session kinds, not a solver.
#[derive(Debug, Clone)]
pub struct StudyPlanOptimizer {
    config: PlannerConfig,
    model: DecisionTreeRegressor,
    trained: bool,
    training_rows: usize,
}

impl StudyPlanOptimizer {
    pub fn new(config: PlannerConfig) -> Self {
        let model =
            DecisionTreeRegressor::new(config.tree_max_depth, config.tree_min_samples_split);
        StudyPlanOptimizer { config, model, trained: false, training_rows: 0 }
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    /// Train the session-quality model on one user's history. Skipped (not an
    /// error) below `min_training_sessions`.
    pub fn train_for_user(&mut self, store: &RecordStore<'_>, user_id: u64) -> bool {
        match self.try_train(store, user_id) {
            Ok(trained) => trained,
            Err(e) => {
                warn!(user_id, error = %e, "plan optimizer training failed; staying rule-based");
                false
            }
        }
    }

    fn try_train(&mut self, store: &RecordStore<'_>, user_id: u64) -> MlResult<bool> {
        let user = match store.user(user_id) {
            Some(u) => u,
            None => {
                info!(user_id, "cannot train plan optimizer for unknown user");
                return Ok(false);
            }
        };
        let own: Vec<&SessionRecord> =
            store.sessions.iter().filter(|s| s.user_id == user_id).collect();

        if own.len() < self.config.min_training_sessions {
            info!(
                user_id,
                sessions = own.len(),
                required = self.config.min_training_sessions,
                "too few sessions; skipping plan optimizer training"
            );
            return Ok(false);
        }

        let mut rows = Vec::with_capacity(own.len());
        let mut targets = Vec::with_capacity(own.len());
        for s in &own {
            rows.push(session_features(user, s, &own));
            targets.push(s.quality());
        }

        let dataset = Dataset::new(rows, targets)?;
        self.model.fit(&dataset)?;
        self.training_rows = dataset.len();
        self.trained = true;
        Ok(true)
    }

    /// Produce a plan. Fail-open: always returns a usable recommendation,
    /// falling back to mined patterns (or defaults) on any internal error.
    pub fn recommend_plan(
        &self,
        store: &RecordStore<'_>,
        user_id: u64,
        request: &PlanRequest,
        now: DateTime<Utc>,
    ) -> StudyPlanRecommendation {
        let user = match store.user(user_id) {
            Some(u) => u,
            None => {
                warn!(user_id, "plan requested for unknown user");
                return self.default_plan(user_id, request);
            }
        };

        let patterns = StudyPatterns::mine(user, store.sessions, self.config.ema_alpha);
        let own: Vec<&SessionRecord> =
            store.sessions.iter().filter(|s| s.user_id == user_id).collect();

        let pattern_hour = patterns
            .best_hour(2)
            .or(patterns.peak_window_hour)
            .unwrap_or(18);
        let pattern_duration = patterns.best_duration(2).unwrap_or(60);

        let (duration, hour, source) = if self.trained {
            match self.model_pick(user, &own) {
                Ok((model_duration, model_hour)) => {
                    // Blend: patterns pull the model's pick toward observed
                    // habits when they have enough support.
                    let hour = if patterns.hourly_counts[pattern_hour as usize] >= 3 {
                        ((model_hour as u32 + pattern_hour as u32) / 2) as u8
                    } else {
                        model_hour
                    };
                    let duration = ((0.6 * model_duration as f64
                        + 0.4 * pattern_duration as f64)
                        / 15.0)
                        .round() as u32
                        * 15;
                    (duration.max(15), hour, ScoreSource::Model)
                }
                Err(e) => {
                    warn!(user_id, error = %e, "quality model scoring failed; using patterns");
                    (pattern_duration, pattern_hour, ScoreSource::Fallback)
                }
            }
        } else {
            (pattern_duration, pattern_hour, ScoreSource::Fallback)
        };

        let days_since_last = own
            .iter()
            .map(|s| s.started_at)
            .max()
            .map(|last| (now - last).num_days());

        let subjects: Vec<String> = if request.subjects.is_empty() {
            if user.subjects.is_empty() {
                vec!["General".to_string()]
            } else {
                user.subjects.clone()
            }
        } else {
            request.subjects.clone()
        };

        let sessions = round_robin_schedule(request, &subjects, hour, duration);

        let mut reasons = describe_patterns(&patterns, hour, duration);
        let mut conf = confidence(self.trained, self.training_rows, &patterns);
        if let Some(days) = days_since_last {
            if days > 14 {
                reasons.push(format!("History is {days} days old; plan may be out of date"));
                conf = (conf - 0.1).max(0.1);
            }
        }
        if reasons.is_empty() {
            reasons.push("Defaults applied; not enough history to personalize".to_string());
        }

        StudyPlanRecommendation {
            user_id,
            optimal_duration_minutes: duration,
            best_start_hour: hour,
            sessions,
            confidence: conf,
            reasons,
            source,
        }
    }

    /// Evaluate every candidate (duration, hour) pair with the trained tree
    /// and return the best.
    fn model_pick(
        &self,
        user: &studykit_core::UserRecord,
        own: &[&SessionRecord],
    ) -> MlResult<(u32, u8)> {
        // Affinity for the user's primary subject, shared by every probe.
        let primary = user.subjects.first().cloned().unwrap_or_default();
        let same: Vec<f64> = own
            .iter()
            .filter(|s| s.subject == primary)
            .map(|s| s.quality())
            .collect();
        let affinity = if same.is_empty() {
            0.5
        } else {
            same.iter().sum::<f64>() / same.len() as f64
        };

        let mut best = (60u32, 18u8);
        let mut best_score = f64::NEG_INFINITY;
        for &duration in &CANDIDATE_DURATIONS {
            for hour in 0..24u8 {
                let score = self.model.predict(&quality_features(hour, duration, affinity))?;
                if score > best_score {
                    best_score = score;
                    best = (duration, hour);
                }
            }
        }
        Ok(best)
    }

    fn default_plan(&self, user_id: u64, request: &PlanRequest) -> StudyPlanRecommendation {
        let subjects = if request.subjects.is_empty() {
            vec!["General".to_string()]
        } else {
            request.subjects.clone()
        };
        StudyPlanRecommendation {
            user_id,
            optimal_duration_minutes: 60,
            best_start_hour: 18,
            sessions: round_robin_schedule(request, &subjects, 18, 60),
            confidence: 0.2,
            reasons: vec!["No history for this user; using defaults".to_string()],
            source: ScoreSource::Fallback,
        }
    }
}

/// Feature layout for the session-quality model:
/// [local start hour / 23, duration / 180, subject affinity].
fn quality_features(hour: u8, duration_minutes: u32, affinity: f64) -> Vec<f64> {
    vec![
        hour as f64 / 23.0,
        (duration_minutes as f64 / 180.0).min(1.0),
        affinity,
    ]
}

fn session_features(
    user: &studykit_core::UserRecord,
    session: &SessionRecord,
    history: &[&SessionRecord],
) -> Vec<f64> {
    let local =
        session.started_at + chrono::Duration::minutes(user.timezone_offset_minutes as i64);
    let hour = chrono::Timelike::hour(&local) as u8;

    // Affinity: how well this subject has gone historically.
    let same: Vec<f64> = history
        .iter()
        .filter(|s| s.subject == session.subject && s.started_at != session.started_at)
        .map(|s| s.quality())
        .collect();
    let affinity = if same.is_empty() {
        0.5
    } else {
        same.iter().sum::<f64>() / same.len() as f64
    };

    quality_features(hour, session.duration_minutes, affinity)
}

fn round_robin_schedule(
    request: &PlanRequest,
    subjects: &[String],
    start_hour: u8,
    duration: u32,
) -> Vec<PlannedSession> {
    const KINDS: [SessionKind; 3] =
        [SessionKind::FocusedStudy, SessionKind::Practice, SessionKind::Review];

    let mut sessions = Vec::with_capacity(request.days * request.sessions_per_day);
    let mut slot = 0usize;
    for day in 0..request.days {
        for s in 0..request.sessions_per_day {
            // Later same-day sessions shift by two hours each, capped at 22:00.
            let hour = (start_hour as u32 + 2 * s as u32).min(22) as u8;
            sessions.push(PlannedSession {
                day_index: day,
                start_hour: hour,
                duration_minutes: duration,
                subject: subjects[slot % subjects.len()].clone(),
                kind: KINDS[slot % KINDS.len()],
            });
            slot += 1;
        }
    }
    sessions
}

fn describe_patterns(patterns: &StudyPatterns, hour: u8, duration: u32) -> Vec<String> {
    let mut reasons = Vec::new();
    if patterns.best_hour(2).is_some() {
        reasons.push(format!("Historically strongest around {hour:02}:00"));
    }
    if patterns.best_duration(2).is_some() {
        reasons.push(format!("Sessions near {duration} minutes complete best"));
    }
    if patterns.mean_quality > 0.0 {
        if patterns.productivity_trend > patterns.mean_quality + 0.05 {
            reasons.push("Productivity is trending up".to_string());
        } else if patterns.productivity_trend < patterns.mean_quality - 0.05 {
            reasons.push("Recent sessions below your average; shorter blocks may help".to_string());
        }
    }
    reasons
}

fn confidence(trained: bool, training_rows: usize, patterns: &StudyPatterns) -> f64 {
    let observed_hours = patterns.hourly_counts.iter().filter(|&&c| c > 0).count();
    let mut c = 0.3 + 0.02 * observed_hours.min(10) as f64;
    if trained {
        c += 0.2 + (training_rows as f64 / 200.0).min(0.2);
    }
    c.min(0.95)
}
