use crate::envelope::OpCode;

/// Reasons a single line of the backend stream could not be turned into an [`crate::Envelope`].
/// None of these are fatal for the stream the line came from.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("Malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("Unknown operation code {0}")]
    UnknownOperation(i64),

    #[error("Body of {op} frame does not match its operation: {source}")]
    BodyMismatch {
        op: OpCode,
        #[source]
        source: serde_json::Error,
    },
}

impl DecodeError {
    pub fn op(&self) -> Option<OpCode> {
        match self {
            DecodeError::BodyMismatch { op, .. } => Some(*op),
            _ => None,
        }
    }
}
