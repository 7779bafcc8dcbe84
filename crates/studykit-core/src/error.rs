use thiserror::Error;

/// Error type shared by all studykit library crates.
///
/// Library code (numeric primitives, model primitives) fails loud with these
/// variants. The domain predictor crates catch them and degrade to rule-based
/// fallbacks instead of propagating to callers.
#[derive(Debug, Error, Clone)]
pub enum MlError {
    #[error("model is not trained: call fit() first")]
    ModelNotTrained,

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("insufficient data: need at least {required} rows, got {got}")]
    InsufficientData { required: usize, got: usize },

    #[error("feature matrix is ill-conditioned: normal equations have no stable solution")]
    IllConditionedInput,

    #[error("singular matrix: cannot solve linear system")]
    SingularMatrix,

    #[error("empty input")]
    EmptyInput,

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("model blob format version mismatch: expected {expected}, got {got}")]
    FormatVersionMismatch { expected: u32, got: u32 },

    #[error("model blob kind mismatch: expected {expected}, got {got}")]
    ModelKindMismatch { expected: String, got: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type MlResult<T> = Result<T, MlError>;
