use chrono::{DateTime, Duration, Timelike, Utc};

use crate::dataset::FeatureVector;
use crate::records::{GoalRecord, PartnershipRecord, ReviewRecord, SessionRecord, UserRecord};

/// Observation window for activity-rate features, in days.
const ACTIVITY_WINDOW_DAYS: i64 = 28;

/// Per-user behavioral aggregate, computed fresh from raw records on every
/// request. Never cached, never versioned.
#[derive(Debug, Clone)]
pub struct UserFeatureProfile {
    pub user_id: u64,
    pub academic_level_encoded: f64,
    /// Mean study hours per week over the activity window.
    pub weekly_study_hours: f64,
    /// Sessions per week over the activity window.
    pub session_frequency: f64,
    /// Consecutive calendar days (ending today or yesterday) with a session.
    pub streak_days: u32,
    pub mean_completion: f64,
    pub goal_completion_rate: f64,
    pub partner_count: usize,
    /// Mean rating received, 0.0 when unrated.
    pub mean_rating: f64,
    pub days_since_last_session: f64,
    pub tenure_days: f64,
    /// Normalized histogram of local session start hours.
    pub hourly_activity: [f64; 24],
}

impl UserFeatureProfile {
    pub const FEATURE_NAMES: [&'static str; 9] = [
        "session_frequency",
        "streak",
        "completion",
        "goal_completion",
        "partner_count",
        "mean_rating",
        "recency",
        "weekly_hours",
        "academic_level",
    ];

    pub fn from_records(
        user: &UserRecord,
        sessions: &[SessionRecord],
        goals: &[GoalRecord],
        partnerships: &[PartnershipRecord],
        reviews: &[ReviewRecord],
        now: DateTime<Utc>,
    ) -> Self {
        let sessions: Vec<&SessionRecord> =
            sessions.iter().filter(|s| s.user_id == user.id).collect();

        let tenure_days = (now - user.created_at).num_seconds().max(0) as f64 / 86_400.0;

        let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);
        let recent: Vec<&&SessionRecord> =
            sessions.iter().filter(|s| s.started_at >= window_start).collect();
        let weeks = ACTIVITY_WINDOW_DAYS as f64 / 7.0;
        let session_frequency = recent.len() as f64 / weeks;
        let weekly_study_hours =
            recent.iter().map(|s| s.duration_minutes as f64).sum::<f64>() / 60.0 / weeks;

        let mean_completion = if sessions.is_empty() {
            0.0
        } else {
            sessions.iter().map(|s| s.completion).sum::<f64>() / sessions.len() as f64
        };

        let streak_days = current_streak(&sessions, now);

        let days_since_last_session = sessions
            .iter()
            .map(|s| s.started_at)
            .max()
            .map(|last| (now - last).num_seconds().max(0) as f64 / 86_400.0)
            .unwrap_or(tenure_days);

        let user_goals: Vec<&GoalRecord> = goals.iter().filter(|g| g.user_id == user.id).collect();
        let goal_completion_rate = if user_goals.is_empty() {
            0.0
        } else {
            user_goals.iter().filter(|g| g.completed).count() as f64 / user_goals.len() as f64
        };

        let partner_count = partnerships
            .iter()
            .filter(|p| p.user_a == user.id || p.user_b == user.id)
            .count();

        let received: Vec<&ReviewRecord> =
            reviews.iter().filter(|r| r.subject_user_id == user.id).collect();
        let mean_rating = if received.is_empty() {
            0.0
        } else {
            received.iter().map(|r| r.rating).sum::<f64>() / received.len() as f64
        };

        let mut hourly_activity = [0.0f64; 24];
        for s in &sessions {
            let local = s.started_at + Duration::minutes(user.timezone_offset_minutes as i64);
            hourly_activity[local.hour() as usize] += 1.0;
        }
        let total: f64 = hourly_activity.iter().sum();
        if total > 0.0 {
            for h in hourly_activity.iter_mut() {
                *h /= total;
            }
        }

        UserFeatureProfile {
            user_id: user.id,
            academic_level_encoded: user.academic_level.encoded(),
            weekly_study_hours,
            session_frequency,
            streak_days,
            mean_completion,
            goal_completion_rate,
            partner_count,
            mean_rating,
            days_since_last_session,
            tenure_days,
            hourly_activity,
        }
    }

    /// Recency factor in [0, 1]: 1.0 for a session today, fading to 0.0 at
    /// two weeks of inactivity.
    pub fn recency_factor(&self) -> f64 {
        (1.0 - self.days_since_last_session / 14.0).clamp(0.0, 1.0)
    }

    /// Fixed-layout feature vector, all entries normalized to [0, 1].
    /// Layout matches `FEATURE_NAMES`.
    pub fn as_features(&self) -> FeatureVector {
        vec![
            (self.session_frequency / 7.0).min(1.0),
            (self.streak_days as f64 / 14.0).min(1.0),
            self.mean_completion.clamp(0.0, 1.0),
            self.goal_completion_rate.clamp(0.0, 1.0),
            (self.partner_count as f64 / 5.0).min(1.0),
            (self.mean_rating / 5.0).clamp(0.0, 1.0),
            self.recency_factor(),
            (self.weekly_study_hours / 20.0).min(1.0),
            self.academic_level_encoded,
        ]
    }
}

/// Borrowed view over the raw records a predictor consumes. Populated once at
/// the boundary from the external store; the ML core never writes back.
#[derive(Debug, Clone, Copy)]
pub struct RecordStore<'a> {
    pub users: &'a [UserRecord],
    pub sessions: &'a [SessionRecord],
    pub goals: &'a [GoalRecord],
    pub partnerships: &'a [PartnershipRecord],
    pub reviews: &'a [ReviewRecord],
}

impl<'a> RecordStore<'a> {
    pub fn user(&self, id: u64) -> Option<&'a UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn profile_for(&self, user: &UserRecord, now: DateTime<Utc>) -> UserFeatureProfile {
        UserFeatureProfile::from_records(
            user,
            self.sessions,
            self.goals,
            self.partnerships,
            self.reviews,
            now,
        )
    }
}

/// Consecutive calendar days with at least one session, counting back from
/// today (or yesterday, so an early-morning check does not break an active
/// streak).
fn current_streak(sessions: &[&SessionRecord], now: DateTime<Utc>) -> u32 {
    use std::collections::HashSet;

    let days: HashSet<i64> = sessions
        .iter()
        .map(|s| s.started_at.timestamp().div_euclid(86_400))
        .collect();
    if days.is_empty() {
        return 0;
    }

    let today = now.timestamp().div_euclid(86_400);
    let mut cursor = if days.contains(&today) {
        today
    } else if days.contains(&(today - 1)) {
        today - 1
    } else {
        return 0;
    };

    let mut streak = 0u32;
    while days.contains(&cursor) {
        streak += 1;
        cursor -= 1;
    }
    streak
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::AcademicLevel;
    use chrono::TimeZone;

    fn user(now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            id: 1,
            academic_level: AcademicLevel::Undergraduate,
            subjects: vec!["math".into()],
            availability: vec![],
            timezone_offset_minutes: 0,
            created_at: now - Duration::days(90),
        }
    }

    fn session(now: DateTime<Utc>, days_ago: i64, completion: f64) -> SessionRecord {
        SessionRecord {
            user_id: 1,
            subject: "math".into(),
            started_at: now - Duration::days(days_ago),
            duration_minutes: 60,
            completion,
            focus: None,
        }
    }

    #[test]
    fn test_streak_counts_consecutive_days() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let sessions: Vec<SessionRecord> = (0..5).map(|d| session(now, d, 0.8)).collect();
        let p = UserFeatureProfile::from_records(&user(now), &sessions, &[], &[], &[], now);
        assert_eq!(p.streak_days, 5);
    }

    #[test]
    fn test_streak_broken_by_gap() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let sessions = vec![session(now, 0, 0.8), session(now, 3, 0.8), session(now, 4, 0.8)];
        let p = UserFeatureProfile::from_records(&user(now), &sessions, &[], &[], &[], now);
        assert_eq!(p.streak_days, 1);
    }

    #[test]
    fn test_no_sessions_gives_zero_activity() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let p = UserFeatureProfile::from_records(&user(now), &[], &[], &[], &[], now);
        assert_eq!(p.streak_days, 0);
        assert_eq!(p.session_frequency, 0.0);
        assert_eq!(p.recency_factor(), 0.0);
    }

    #[test]
    fn test_feature_vector_is_normalized() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 18, 0, 0).unwrap();
        let sessions: Vec<SessionRecord> = (0..30).map(|d| session(now, d % 14, 0.9)).collect();
        let p = UserFeatureProfile::from_records(&user(now), &sessions, &[], &[], &[], now);
        let f = p.as_features();
        assert_eq!(f.len(), UserFeatureProfile::FEATURE_NAMES.len());
        for v in f {
            assert!((0.0..=1.0).contains(&v), "feature out of range: {v}");
        }
    }
}
