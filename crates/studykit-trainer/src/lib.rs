mod harness;
mod snapshot;

pub use harness::{
    ClassificationMetrics, CrossValidationReport, GridPoint, GridSearchReport, GridSearchSpace,
    ModelTrainer, TrainerConfig, TrainingFrame, TrainingReport,
};
pub use snapshot::{read_snapshot, write_snapshot};
