pub mod patterns;

mod engine;

pub use engine::{
    PlanRequest, PlannedSession, PlannerConfig, SessionKind, StudyPlanOptimizer,
    StudyPlanRecommendation,
};
pub use patterns::{DurationBucket, StudyPatterns};
