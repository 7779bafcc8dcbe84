use serde::{Deserialize, Serialize};

use studykit_engagement::{EngagementConfig, EngagementPredictor};
use studykit_matching::{MatchingConfig, PartnerMatchingEngine};
use studykit_planner::{PlannerConfig, StudyPlanOptimizer};
use studykit_recommend::{ContentRecommendationEngine, RecommenderConfig};
use studykit_trainer::{ModelTrainer, TrainerConfig};

/// Aggregated configuration for every engine, deserializable from one
/// document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub matching: MatchingConfig,
    pub planner: PlannerConfig,
    pub recommender: RecommenderConfig,
    pub engagement: EngagementConfig,
    pub trainer: TrainerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub name: &'static str,
    pub ready: bool,
    pub trained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub version: &'static str,
    pub components: Vec<ComponentStatus>,
}

impl EngineStatus {
    pub fn healthy(&self) -> bool {
        self.components.iter().all(|c| c.ready)
    }
}

/// Container owning one instance of each predictor.
///
/// Construct one per process (or per request scope) and pass it where
/// needed; there is no global instance. The container itself only reports
/// status; coordination between engines is up to the caller.
#[derive(Debug)]
pub struct StudyEngines {
    pub matching: PartnerMatchingEngine,
    pub planner: StudyPlanOptimizer,
    pub recommender: ContentRecommendationEngine,
    pub engagement: EngagementPredictor,
    pub trainer: ModelTrainer,
}

impl StudyEngines {
    pub fn from_config(config: EngineConfig) -> Self {
        StudyEngines {
            matching: PartnerMatchingEngine::new(config.matching),
            planner: StudyPlanOptimizer::new(config.planner),
            recommender: ContentRecommendationEngine::new(config.recommender),
            engagement: EngagementPredictor::new(config.engagement),
            trainer: ModelTrainer::new(config.trainer),
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            version: env!("CARGO_PKG_VERSION"),
            components: vec![
                ComponentStatus {
                    name: "partner_matching",
                    ready: true,
                    trained: self.matching.is_trained(),
                },
                ComponentStatus {
                    name: "study_plan_optimizer",
                    ready: true,
                    trained: self.planner.is_trained(),
                },
                ComponentStatus {
                    name: "content_recommender",
                    ready: true,
                    trained: self.recommender.is_trained(),
                },
                ComponentStatus {
                    name: "engagement_predictor",
                    ready: true,
                    trained: self.engagement.is_calibrated(),
                },
                ComponentStatus { name: "model_trainer", ready: true, trained: false },
            ],
        }
    }
}

impl Default for StudyEngines {
    fn default() -> Self {
        Self::from_config(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_engines_are_ready_but_untrained() {
        let engines = StudyEngines::default();
        let status = engines.status();
        assert!(status.healthy());
        assert!(status.components.iter().all(|c| !c.trained));
        assert_eq!(status.components.len(), 5);
    }

    #[test]
    fn test_config_deserializes_with_partial_document() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"matching":{"min_training_partnerships":5,"model_k":2}}"#)
                .unwrap();
        assert_eq!(config.matching.min_training_partnerships, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.recommender.min_training_interactions, 50);
    }
}
