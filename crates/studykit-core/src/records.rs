use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Self-reported academic level of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcademicLevel {
    HighSchool,
    Undergraduate,
    Graduate,
    Professional,
}

impl AcademicLevel {
    /// Ordinal feature encoding.
    pub fn encoded(self) -> f64 {
        match self {
            AcademicLevel::HighSchool => 0.2,
            AcademicLevel::Undergraduate => 0.4,
            AcademicLevel::Graduate => 0.7,
            AcademicLevel::Professional => 1.0,
        }
    }
}

/// A weekly recurring availability slot. `day` is 0 (Monday) through 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day: u8,
    pub start_hour: u8,
    pub end_hour: u8,
}

impl AvailabilityWindow {
    pub fn hours(&self) -> f64 {
        self.end_hour.saturating_sub(self.start_hour) as f64
    }

    /// Overlapping hours with another window, 0.0 when on different days.
    pub fn overlap_hours(&self, other: &AvailabilityWindow) -> f64 {
        if self.day != other.day {
            return 0.0;
        }
        let start = self.start_hour.max(other.start_hour);
        let end = self.end_hour.min(other.end_hour);
        end.saturating_sub(start) as f64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: u64,
    pub academic_level: AcademicLevel,
    pub subjects: Vec<String>,
    pub availability: Vec<AvailabilityWindow>,
    pub timezone_offset_minutes: i32,
    pub created_at: DateTime<Utc>,
}

/// One completed (or abandoned) personal study session.
/// `completion` is the fraction of the planned session actually finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: u64,
    pub subject: String,
    pub started_at: DateTime<Utc>,
    pub duration_minutes: u32,
    pub completion: f64,
    pub focus: Option<f64>,
}

impl SessionRecord {
    /// Session quality in [0, 1]: completion blended with focus when reported.
    pub fn quality(&self) -> f64 {
        match self.focus {
            Some(f) => (self.completion + f) / 2.0,
            None => self.completion,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalRecord {
    pub user_id: u64,
    pub created_at: DateTime<Utc>,
    pub target_date: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// An established study partnership between two users.
/// `outcome` is an observed success score in [0, 1] once the partnership has
/// run long enough to judge; `None` while still fresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnershipRecord {
    pub user_a: u64,
    pub user_b: u64,
    pub created_at: DateTime<Utc>,
    pub session_count: u32,
    pub outcome: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub reviewer_id: u64,
    pub subject_user_id: u64,
    pub rating: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentType {
    Video,
    Article,
    Quiz,
    Flashcards,
    PracticeSet,
}

impl ContentType {
    pub fn encoded(self) -> f64 {
        match self {
            ContentType::Video => 0.1,
            ContentType::Article => 0.3,
            ContentType::Quiz => 0.5,
            ContentType::Flashcards => 0.7,
            ContentType::PracticeSet => 0.9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: u64,
    pub title: String,
    pub content_type: ContentType,
    pub subject: String,
    pub difficulty: f64,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionKind {
    Viewed,
    Completed,
    Rated,
    Bookmarked,
}

/// A single user/content interaction event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: u64,
    pub content_id: u64,
    pub kind: InteractionKind,
    pub rating: Option<f64>,
    pub completion: Option<f64>,
    pub occurred_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// Collapse the interaction into one preference signal in [0, 1].
    ///
    /// Precedence: explicit rating, then completion, then a base value for
    /// the interaction kind. This is the single place the rule lives.
    pub fn signal(&self) -> f64 {
        if let Some(r) = self.rating {
            return (r / 5.0).clamp(0.0, 1.0);
        }
        if let Some(c) = self.completion {
            return c.clamp(0.0, 1.0);
        }
        match self.kind {
            InteractionKind::Viewed => 0.3,
            InteractionKind::Completed => 0.8,
            InteractionKind::Rated => 0.5,
            InteractionKind::Bookmarked => 0.6,
        }
    }
}
