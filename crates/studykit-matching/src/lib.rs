pub mod features;

mod engine;

pub use engine::{MatchResult, MatchingConfig, PartnerMatchingEngine};
