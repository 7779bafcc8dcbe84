pub mod features;

mod engine;

pub use engine::{ContentRecommendation, ContentRecommendationEngine, RecommenderConfig};
pub use features::TasteProfile;
