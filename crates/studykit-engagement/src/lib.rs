use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use studykit_core::{RecordStore, ScoreSource, UserFeatureProfile};
use studykit_numeric::mean;

/// Scoring weights. These constants define the product behavior; the score
/// is a fixed weighted sum, not a learned function.
const W_FREQUENCY: f64 = 25.0;
const W_STREAK: f64 = 20.0;
const W_SESSION_COMPLETION: f64 = 15.0;
const W_GOAL_COMPLETION: f64 = 10.0;
const W_SOCIAL: f64 = 10.0;
const W_RECENCY: f64 = 20.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Scores at or above this are low risk.
    pub risk_low_threshold: f64,
    /// Scores at or above this (but below low) are medium risk.
    pub risk_medium_threshold: f64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        EngagementConfig { risk_low_threshold: 70.0, risk_medium_threshold: 40.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementPrediction {
    pub user_id: u64,
    /// 0–100 heuristic estimate of continued usage.
    pub engagement_score: f64,
    pub risk_level: RiskLevel,
    /// Estimated days until the user goes quiet.
    pub predicted_dropout_days: u32,
    pub confidence: f64,
    pub factors: Vec<String>,
    pub source: ScoreSource,
}

/// Rule-based engagement predictor.
///
/// One implementation, one scoring policy: the weighted sum over the profile
/// features above. `fit` stores cohort feature averages for confidence
/// calibration and cohort-relative factors; it never changes how the score
/// itself is computed. `source` reports `Model` once cohort calibration is
/// available, `Fallback` otherwise.
#[derive(Debug, Clone, Default)]
pub struct EngagementPredictor {
    config: EngagementConfig,
    cohort_means: Option<Vec<f64>>,
    cohort_size: usize,
}

impl EngagementPredictor {
    pub fn new(config: EngagementConfig) -> Self {
        EngagementPredictor { config, cohort_means: None, cohort_size: 0 }
    }

    pub fn is_calibrated(&self) -> bool {
        self.cohort_means.is_some()
    }

    /// Store cohort feature averages. Empty cohorts leave the predictor
    /// uncalibrated; this never fails.
    pub fn fit(&mut self, cohort: &[UserFeatureProfile]) {
        if cohort.is_empty() {
            warn!("engagement fit called with empty cohort; calibration unchanged");
            return;
        }
        let width = UserFeatureProfile::FEATURE_NAMES.len();
        let mut means = vec![0.0; width];
        for profile in cohort {
            for (slot, v) in profile.as_features().iter().enumerate() {
                means[slot] += v;
            }
        }
        for m in means.iter_mut() {
            *m /= cohort.len() as f64;
        }
        self.cohort_means = Some(means);
        self.cohort_size = cohort.len();
    }

    /// Score a user from the raw records. Fail-open: an unknown user gets a
    /// neutral medium-risk result rather than an error.
    pub fn predict_engagement(
        &self,
        store: &RecordStore<'_>,
        user_id: u64,
        now: DateTime<Utc>,
    ) -> EngagementPrediction {
        let user = match store.user(user_id) {
            Some(u) => u,
            None => {
                warn!(user_id, "engagement requested for unknown user");
                return EngagementPrediction {
                    user_id,
                    engagement_score: 50.0,
                    risk_level: RiskLevel::Medium,
                    predicted_dropout_days: 10,
                    confidence: 0.1,
                    factors: vec!["No records for this user".to_string()],
                    source: ScoreSource::Fallback,
                };
            }
        };

        let profile = store.profile_for(user, now);
        self.predict_from_profile(&profile)
    }

    /// Score directly from an already-computed profile.
    pub fn predict_from_profile(&self, profile: &UserFeatureProfile) -> EngagementPrediction {
        let score = engagement_score(profile);
        let risk_level = if score >= self.config.risk_low_threshold {
            RiskLevel::Low
        } else if score >= self.config.risk_medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        };

        EngagementPrediction {
            user_id: profile.user_id,
            engagement_score: score,
            risk_level,
            predicted_dropout_days: dropout_days(score, profile),
            confidence: self.confidence(profile),
            factors: self.describe(profile, score),
            source: if self.is_calibrated() { ScoreSource::Model } else { ScoreSource::Fallback },
        }
    }

    fn confidence(&self, profile: &UserFeatureProfile) -> f64 {
        // More observed history, more confidence; calibration adds on top.
        let mut c = 0.4 + (profile.tenure_days / 90.0).min(0.2);
        if self.is_calibrated() {
            c += 0.1 + (self.cohort_size as f64 / 100.0).min(0.2);
        }
        c.min(0.95)
    }

    fn describe(&self, profile: &UserFeatureProfile, score: f64) -> Vec<String> {
        let mut factors = Vec::new();
        if profile.streak_days >= 7 {
            factors.push(format!("Active streak of {} days", profile.streak_days));
        }
        if profile.session_frequency >= 4.0 {
            factors.push("Studies most days of the week".to_string());
        } else if profile.session_frequency < 1.0 {
            factors.push("Less than one session per week".to_string());
        }
        if profile.goal_completion_rate >= 0.7 {
            factors.push("Completes most goals".to_string());
        }
        if profile.days_since_last_session > 7.0 {
            factors.push(format!(
                "No sessions in {:.0} days",
                profile.days_since_last_session
            ));
        }
        if let Some(means) = &self.cohort_means {
            let cohort_mean_score = mean(means) * 100.0;
            if score > cohort_mean_score {
                factors.push("Above the cohort average".to_string());
            }
        }
        if factors.is_empty() {
            factors.push("Limited history; neutral outlook".to_string());
        }
        factors
    }
}

/// The fixed weighted-sum scoring rule, clamped to 0–100. Monotonic in every
/// positively-weighted input.
pub fn engagement_score(profile: &UserFeatureProfile) -> f64 {
    let frequency = (profile.session_frequency / 7.0).min(1.0);
    let streak = (profile.streak_days as f64 / 14.0).min(1.0);
    let session_completion = profile.mean_completion.clamp(0.0, 1.0);
    let goal_completion = profile.goal_completion_rate.clamp(0.0, 1.0);
    let social = ((profile.partner_count as f64 / 3.0).min(1.0)
        + (profile.mean_rating / 5.0).clamp(0.0, 1.0))
        / 2.0;
    let recency = profile.recency_factor();

    let score = W_FREQUENCY * frequency
        + W_STREAK * streak
        + W_SESSION_COMPLETION * session_completion
        + W_GOAL_COMPLETION * goal_completion
        + W_SOCIAL * social
        + W_RECENCY * recency;

    score.clamp(0.0, 100.0)
}

/// Dropout-day heuristic:
/// `max(1, floor((100 - score) / 10)) × activity multiplier × streak multiplier`.
fn dropout_days(score: f64, profile: &UserFeatureProfile) -> u32 {
    let base = (((100.0 - score) / 10.0).floor()).max(1.0);

    let frequency = (profile.session_frequency / 7.0).min(1.0);
    let activity_multiplier = if frequency > 0.7 {
        3.0
    } else if frequency > 0.3 {
        2.0
    } else {
        1.0
    };
    let streak_multiplier = if profile.streak_days >= 7 {
        2.0
    } else if profile.streak_days >= 3 {
        1.5
    } else {
        1.0
    };

    (base * activity_multiplier * streak_multiplier).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use studykit_core::{
        AcademicLevel, GoalRecord, SessionRecord, UserRecord,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 20, 0, 0).unwrap()
    }

    fn user(id: u64) -> UserRecord {
        UserRecord {
            id,
            academic_level: AcademicLevel::Undergraduate,
            subjects: vec!["math".into()],
            availability: vec![],
            timezone_offset_minutes: 0,
            created_at: now() - Duration::days(100),
        }
    }

    fn session(days_ago: i64, completion: f64) -> SessionRecord {
        SessionRecord {
            user_id: 1,
            subject: "math".into(),
            started_at: now() - Duration::days(days_ago),
            duration_minutes: 60,
            completion,
            focus: None,
        }
    }

    fn profile(
        sessions: &[SessionRecord],
        goals: &[GoalRecord],
    ) -> UserFeatureProfile {
        UserFeatureProfile::from_records(&user(1), sessions, goals, &[], &[], now())
    }

    fn fixed_profile() -> UserFeatureProfile {
        UserFeatureProfile {
            user_id: 1,
            academic_level_encoded: 0.4,
            weekly_study_hours: 5.0,
            session_frequency: 3.0,
            streak_days: 4,
            mean_completion: 0.6,
            goal_completion_rate: 0.5,
            partner_count: 1,
            mean_rating: 4.0,
            days_since_last_session: 2.0,
            tenure_days: 60.0,
            hourly_activity: [0.0; 24],
        }
    }

    #[test]
    fn test_score_monotonic_in_frequency_alone() {
        let base = fixed_profile();
        let mut busier = fixed_profile();
        busier.session_frequency = 6.0;
        assert!(engagement_score(&busier) > engagement_score(&base));

        // Beyond the cap the score plateaus but never decreases.
        let mut maxed = fixed_profile();
        maxed.session_frequency = 20.0;
        assert!(engagement_score(&maxed) >= engagement_score(&busier));
    }

    #[test]
    fn test_score_monotonic_in_streak() {
        let short: Vec<SessionRecord> = (0..3).map(|d| session(d, 0.8)).collect();
        let long: Vec<SessionRecord> = (0..10).map(|d| session(d, 0.8)).collect();
        let s_short = engagement_score(&profile(&short, &[]));
        let s_long = engagement_score(&profile(&long, &[]));
        assert!(s_long >= s_short);
    }

    #[test]
    fn test_score_monotonic_in_completion() {
        let low: Vec<SessionRecord> = (0..5).map(|d| session(d, 0.3)).collect();
        let high: Vec<SessionRecord> = (0..5).map(|d| session(d, 0.9)).collect();
        assert!(
            engagement_score(&profile(&high, &[])) >= engagement_score(&profile(&low, &[]))
        );
    }

    #[test]
    fn test_score_monotonic_in_goal_completion() {
        let sessions: Vec<SessionRecord> = (0..5).map(|d| session(d, 0.8)).collect();
        let goal = |completed| GoalRecord {
            user_id: 1,
            created_at: now() - Duration::days(30),
            target_date: None,
            completed,
        };
        let none = vec![goal(false), goal(false)];
        let all = vec![goal(true), goal(true)];
        assert!(
            engagement_score(&profile(&sessions, &all))
                >= engagement_score(&profile(&sessions, &none))
        );
    }

    #[test]
    fn test_active_user_is_low_risk() {
        // 25 sessions, completion rising over time, 14-day streak.
        let sessions: Vec<SessionRecord> = (0..25)
            .map(|i| session(i.min(13), 0.5 + 0.02 * (25 - i) as f64))
            .collect();
        let store = RecordStore {
            users: &[user(1)],
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };
        let predictor = EngagementPredictor::new(EngagementConfig::default());
        let prediction = predictor.predict_engagement(&store, 1, now());

        assert_eq!(prediction.risk_level, RiskLevel::Low);
        assert!(
            prediction.engagement_score >= 70.0,
            "score = {}",
            prediction.engagement_score
        );
        assert!(!prediction.factors.is_empty());
    }

    #[test]
    fn test_inactive_user_is_high_risk_soon() {
        let sessions = vec![session(30, 0.4)];
        let store = RecordStore {
            users: &[user(1)],
            sessions: &sessions,
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };
        let predictor = EngagementPredictor::new(EngagementConfig::default());
        let prediction = predictor.predict_engagement(&store, 1, now());

        assert_eq!(prediction.risk_level, RiskLevel::High);
        // Base days only: no activity or streak multipliers.
        assert!(prediction.predicted_dropout_days <= 10);
    }

    #[test]
    fn test_dropout_days_heuristic() {
        // Engaged daily user: base days tripled (frequency) and doubled (streak).
        let sessions: Vec<SessionRecord> = (0..28).map(|d| session(d, 0.9)).collect();
        let p = profile(&sessions, &[]);
        let score = engagement_score(&p);
        let days = dropout_days(score, &p);
        let base = (((100.0 - score) / 10.0).floor()).max(1.0) as u32;
        assert_eq!(days, base * 6);
    }

    #[test]
    fn test_unknown_user_degrades() {
        let store = RecordStore {
            users: &[],
            sessions: &[],
            goals: &[],
            partnerships: &[],
            reviews: &[],
        };
        let predictor = EngagementPredictor::new(EngagementConfig::default());
        let prediction = predictor.predict_engagement(&store, 42, now());
        assert_eq!(prediction.risk_level, RiskLevel::Medium);
        assert_eq!(prediction.source, ScoreSource::Fallback);
    }

    #[test]
    fn test_calibration_switches_source() {
        let sessions: Vec<SessionRecord> = (0..5).map(|d| session(d, 0.8)).collect();
        let p = profile(&sessions, &[]);

        let mut predictor = EngagementPredictor::new(EngagementConfig::default());
        assert_eq!(predictor.predict_from_profile(&p).source, ScoreSource::Fallback);

        predictor.fit(&[p.clone()]);
        assert_eq!(predictor.predict_from_profile(&p).source, ScoreSource::Model);
    }
}
