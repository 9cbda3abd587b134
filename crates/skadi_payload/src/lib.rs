pub mod body;
pub mod envelope;
pub mod error;
pub mod wrappers;

pub use body::*;
pub use envelope::{decode, Envelope, OpCode};
pub use error::DecodeError;
pub use wrappers::WorkspaceId;
