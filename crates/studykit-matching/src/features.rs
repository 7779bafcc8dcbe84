use std::collections::HashSet;

use studykit_core::{FeatureVector, UserFeatureProfile, UserRecord};
use studykit_numeric::cosine_similarity;

/// Width of the combined pair feature vector: both users' profile features
/// plus the pairwise block.
pub const PAIR_FEATURE_LEN: usize = UserFeatureProfile::FEATURE_NAMES.len() * 2 + 8;

/// Pairwise-derived compatibility signals, each in [0, 1].
///
/// All of these are real, deterministic computations over the records; there
/// are no random placeholder features.
#[derive(Debug, Clone, Copy)]
pub struct PairSignals {
    pub subject_overlap: f64,
    pub availability_overlap: f64,
    pub academic_proximity: f64,
    pub timezone_proximity: f64,
    pub rhythm_similarity: f64,
    pub rating_synergy: f64,
    pub frequency_balance: f64,
    pub completion_pair: f64,
}

impl PairSignals {
    pub fn compute(
        a: &UserRecord,
        b: &UserRecord,
        pa: &UserFeatureProfile,
        pb: &UserFeatureProfile,
    ) -> Self {
        PairSignals {
            subject_overlap: jaccard(&a.subjects, &b.subjects),
            availability_overlap: availability_overlap_score(a, b),
            academic_proximity: 1.0
                - (a.academic_level.encoded() - b.academic_level.encoded()).abs(),
            timezone_proximity: timezone_proximity(a, b),
            rhythm_similarity: cosine_similarity(&pa.hourly_activity, &pb.hourly_activity)
                .max(0.0),
            rating_synergy: ((pa.mean_rating / 5.0) * (pb.mean_rating / 5.0)).sqrt(),
            frequency_balance: 1.0
                - ((pa.session_frequency - pb.session_frequency).abs() / 7.0).min(1.0),
            completion_pair: (pa.mean_completion + pb.mean_completion) / 2.0,
        }
    }

    fn as_vec(&self) -> Vec<f64> {
        vec![
            self.subject_overlap,
            self.availability_overlap,
            self.academic_proximity,
            self.timezone_proximity,
            self.rhythm_similarity,
            self.rating_synergy,
            self.frequency_balance,
            self.completion_pair,
        ]
    }
}

/// Combined model input: a's features, b's features, pairwise block.
pub fn pair_features(
    pa: &UserFeatureProfile,
    pb: &UserFeatureProfile,
    signals: &PairSignals,
) -> FeatureVector {
    let mut v = Vec::with_capacity(PAIR_FEATURE_LEN);
    v.extend(pa.as_features());
    v.extend(pb.as_features());
    v.extend(signals.as_vec());
    v
}

/// Jaccard similarity over subject names, case-insensitive.
fn jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let sa: HashSet<String> = a.iter().map(|s| s.to_lowercase()).collect();
    let sb: HashSet<String> = b.iter().map(|s| s.to_lowercase()).collect();
    let intersection = sa.intersection(&sb).count() as f64;
    let union = sa.union(&sb).count() as f64;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Weekly overlapping availability hours, capped at 10h/week for the [0, 1]
/// encoding.
fn availability_overlap_score(a: &UserRecord, b: &UserRecord) -> f64 {
    let mut hours = 0.0;
    for wa in &a.availability {
        for wb in &b.availability {
            hours += wa.overlap_hours(wb);
        }
    }
    (hours / 10.0).min(1.0)
}

/// 1.0 for the same offset, fading to 0.0 at twelve hours apart.
fn timezone_proximity(a: &UserRecord, b: &UserRecord) -> f64 {
    let diff = (a.timezone_offset_minutes - b.timezone_offset_minutes).abs() as f64;
    (1.0 - diff / 720.0).max(0.0)
}
