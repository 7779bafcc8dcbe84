pub mod dataset;
pub mod error;
pub mod profile;
pub mod records;
pub mod score;

pub use dataset::{train_test_split, Dataset, FeatureVector, MultiDataset};
pub use error::{MlError, MlResult};
pub use profile::{RecordStore, UserFeatureProfile};
pub use score::ScoreSource;
pub use records::{
    AcademicLevel, AvailabilityWindow, ContentRecord, ContentType, GoalRecord, InteractionKind,
    InteractionRecord, PartnershipRecord, ReviewRecord, SessionRecord, UserRecord,
};
