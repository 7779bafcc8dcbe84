use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use studykit_core::{MlError, MlResult};

/// Current model blob format version. Bumped on any state-shape change.
pub const FORMAT_VERSION: u32 = 1;

/// Versioned JSON envelope around serialized model state.
///
/// The explicit version tag turns a shape-drift parse failure into a clear
/// `FormatVersionMismatch`, and the `kind` tag rejects loading one model's
/// blob into another model type.
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelBlob {
    pub format_version: u32,
    pub kind: String,
    pub payload: serde_json::Value,
}

impl ModelBlob {
    pub fn wrap<S: Serialize>(kind: &str, state: &S) -> MlResult<String> {
        let payload = serde_json::to_value(state)
            .map_err(|e| MlError::Serialization(e.to_string()))?;
        let blob = ModelBlob {
            format_version: FORMAT_VERSION,
            kind: kind.to_string(),
            payload,
        };
        serde_json::to_string(&blob).map_err(|e| MlError::Serialization(e.to_string()))
    }

    pub fn unwrap_state<D: DeserializeOwned>(blob: &str, kind: &str) -> MlResult<D> {
        let envelope: ModelBlob =
            serde_json::from_str(blob).map_err(|e| MlError::Serialization(e.to_string()))?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(MlError::FormatVersionMismatch {
                expected: FORMAT_VERSION,
                got: envelope.format_version,
            });
        }
        if envelope.kind != kind {
            return Err(MlError::ModelKindMismatch {
                expected: kind.to_string(),
                got: envelope.kind,
            });
        }
        serde_json::from_value(envelope.payload)
            .map_err(|e| MlError::Serialization(e.to_string()))
    }
}
