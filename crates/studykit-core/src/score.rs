use serde::{Deserialize, Serialize};

/// Where a prediction's score came from.
///
/// Every predictor result carries this field so callers can distinguish a
/// trained-model score from a rule-based fallback; the two are otherwise
/// indistinguishable in the response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSource {
    Model,
    Fallback,
}
