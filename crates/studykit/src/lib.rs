//! Behavioral ML toolkit for a study-partner platform: pluggable statistical
//! predictors over tabular user-behavior features.
//!
//! The library crates fail loud with typed errors; the predictor engines fail
//! open, always returning a usable best-effort result tagged with its
//! [`ScoreSource`].

mod engine;

pub use engine::{ComponentStatus, EngineConfig, EngineStatus, StudyEngines};

pub use studykit_core::{
    train_test_split, AcademicLevel, AvailabilityWindow, ContentRecord, ContentType, Dataset,
    FeatureVector, GoalRecord, InteractionKind, InteractionRecord, MlError, MlResult,
    MultiDataset, PartnershipRecord, RecordStore, ReviewRecord, ScoreSource, SessionRecord,
    UserFeatureProfile, UserRecord,
};
pub use studykit_engagement::{
    EngagementConfig, EngagementPrediction, EngagementPredictor, RiskLevel,
};
pub use studykit_matching::{MatchResult, MatchingConfig, PartnerMatchingEngine};
pub use studykit_models::{
    DecisionTreeRegressor, KnnRegressor, LinearRegression, ModelBlob, MultiLayerPerceptron,
    SupervisedModel,
};
pub use studykit_numeric as numeric;
pub use studykit_planner::{
    PlanRequest, PlannedSession, PlannerConfig, SessionKind, StudyPlanOptimizer,
    StudyPlanRecommendation,
};
pub use studykit_recommend::{
    ContentRecommendation, ContentRecommendationEngine, RecommenderConfig,
};
pub use studykit_trainer::{
    read_snapshot, write_snapshot, ClassificationMetrics, CrossValidationReport, GridPoint,
    GridSearchReport, GridSearchSpace, ModelTrainer, TrainerConfig, TrainingFrame,
    TrainingReport,
};
