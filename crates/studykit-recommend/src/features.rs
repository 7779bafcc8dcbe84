use std::collections::HashMap;

use studykit_core::{ContentRecord, ContentType, FeatureVector, InteractionRecord, UserRecord};

pub const CONTENT_TYPES: [ContentType; 5] = [
    ContentType::Video,
    ContentType::Article,
    ContentType::Quiz,
    ContentType::Flashcards,
    ContentType::PracticeSet,
];

/// Width of a scoring row: the user preference block plus the content block.
pub const SCORING_FEATURE_LEN: usize = USER_BLOCK_LEN + CONTENT_BLOCK_LEN;

const USER_BLOCK_LEN: usize = CONTENT_TYPES.len() + 3;
const CONTENT_BLOCK_LEN: usize = 4;

/// A user's content taste, aggregated from their interaction history.
#[derive(Debug, Clone)]
pub struct TasteProfile {
    /// Mean signal per content type, 0.0 where unobserved.
    pub type_preference: [f64; 5],
    pub mean_difficulty: f64,
    pub mean_duration_minutes: f64,
    pub interaction_count: usize,
    /// Mean signal per subject.
    subject_affinity: HashMap<String, f64>,
}

impl TasteProfile {
    pub fn build(
        user: &UserRecord,
        interactions: &[InteractionRecord],
        contents: &[ContentRecord],
    ) -> Self {
        let by_id: HashMap<u64, &ContentRecord> =
            contents.iter().map(|c| (c.id, c)).collect();

        let mut type_sum = [0.0f64; 5];
        let mut type_count = [0usize; 5];
        let mut subject_sum: HashMap<String, (f64, usize)> = HashMap::new();
        let mut difficulty_sum = 0.0;
        let mut duration_sum = 0.0;
        let mut matched = 0usize;

        for i in interactions.iter().filter(|i| i.user_id == user.id) {
            let content = match by_id.get(&i.content_id) {
                Some(c) => c,
                None => continue,
            };
            let signal = i.signal();
            let slot = CONTENT_TYPES
                .iter()
                .position(|&t| t == content.content_type)
                .unwrap_or(0);
            type_sum[slot] += signal;
            type_count[slot] += 1;

            let entry = subject_sum.entry(content.subject.clone()).or_insert((0.0, 0));
            entry.0 += signal;
            entry.1 += 1;

            difficulty_sum += content.difficulty;
            duration_sum += content.duration_minutes as f64;
            matched += 1;
        }

        let mut type_preference = [0.0f64; 5];
        for t in 0..5 {
            if type_count[t] > 0 {
                type_preference[t] = type_sum[t] / type_count[t] as f64;
            }
        }

        let subject_affinity = subject_sum
            .into_iter()
            .map(|(subject, (sum, count))| (subject, sum / count as f64))
            .collect();

        TasteProfile {
            type_preference,
            mean_difficulty: if matched > 0 { difficulty_sum / matched as f64 } else { 0.5 },
            mean_duration_minutes: if matched > 0 { duration_sum / matched as f64 } else { 30.0 },
            interaction_count: matched,
            subject_affinity,
        }
    }

    /// Mean historical signal for a subject; 0.5 (neutral) when unseen.
    pub fn subject_affinity(&self, subject: &str) -> f64 {
        self.subject_affinity.get(subject).copied().unwrap_or(0.5)
    }

    fn as_block(&self) -> Vec<f64> {
        let mut v = Vec::with_capacity(USER_BLOCK_LEN);
        v.extend_from_slice(&self.type_preference);
        v.push(self.mean_difficulty);
        v.push((self.mean_duration_minutes / 120.0).min(1.0));
        v.push((self.interaction_count as f64 / 50.0).min(1.0));
        v
    }
}

/// Model input for scoring one (user, content) pair.
pub fn scoring_features(taste: &TasteProfile, content: &ContentRecord) -> FeatureVector {
    let mut v = taste.as_block();
    v.push(content.content_type.encoded());
    v.push(content.difficulty);
    v.push((content.duration_minutes as f64 / 120.0).min(1.0));
    v.push(taste.subject_affinity(&content.subject));
    v
}

/// Global mean signal per content id: the popularity prior used by the
/// fallback ranking.
pub fn popularity(interactions: &[InteractionRecord]) -> HashMap<u64, f64> {
    let mut sums: HashMap<u64, (f64, usize)> = HashMap::new();
    for i in interactions {
        let entry = sums.entry(i.content_id).or_insert((0.0, 0));
        entry.0 += i.signal();
        entry.1 += 1;
    }
    sums.into_iter().map(|(id, (sum, count))| (id, sum / count as f64)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use studykit_core::{AcademicLevel, InteractionKind};

    fn user() -> UserRecord {
        UserRecord {
            id: 1,
            academic_level: AcademicLevel::Undergraduate,
            subjects: vec!["math".into()],
            availability: vec![],
            timezone_offset_minutes: 0,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn content(id: u64, content_type: ContentType, subject: &str) -> ContentRecord {
        ContentRecord {
            id,
            title: format!("content {id}"),
            content_type,
            subject: subject.into(),
            difficulty: 0.5,
            duration_minutes: 30,
        }
    }

    fn rated(content_id: u64, rating: f64) -> InteractionRecord {
        InteractionRecord {
            user_id: 1,
            content_id,
            kind: InteractionKind::Rated,
            rating: Some(rating),
            completion: None,
            occurred_at: Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_taste_prefers_highly_rated_type() {
        let contents = vec![
            content(10, ContentType::Video, "math"),
            content(11, ContentType::Quiz, "math"),
        ];
        let interactions = vec![rated(10, 5.0), rated(11, 1.0)];
        let taste = TasteProfile::build(&user(), &interactions, &contents);

        let video_slot =
            CONTENT_TYPES.iter().position(|&t| t == ContentType::Video).unwrap();
        let quiz_slot =
            CONTENT_TYPES.iter().position(|&t| t == ContentType::Quiz).unwrap();
        assert!(taste.type_preference[video_slot] > taste.type_preference[quiz_slot]);
    }

    #[test]
    fn test_unseen_subject_is_neutral() {
        let taste = TasteProfile::build(&user(), &[], &[]);
        assert_eq!(taste.subject_affinity("anything"), 0.5);
    }

    #[test]
    fn test_scoring_feature_width() {
        let contents = vec![content(10, ContentType::Video, "math")];
        let taste = TasteProfile::build(&user(), &[], &contents);
        let row = scoring_features(&taste, &contents[0]);
        assert_eq!(row.len(), SCORING_FEATURE_LEN);
    }

    #[test]
    fn test_popularity_means_signals() {
        let interactions = vec![rated(10, 5.0), rated(10, 3.0)];
        let pop = popularity(&interactions);
        assert!((pop[&10] - 0.8).abs() < 1e-12);
    }
}
