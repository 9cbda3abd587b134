use serde::{Deserialize, Serialize};

use crate::{
    body::{BackendError, MediaEvent, SysinfoSnapshot, VolumeEvent, WindowChanged, WorkspaceEvent},
    error::DecodeError,
};

/// Operation tag of a frame. The numeric values are part of the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::FromRepr)]
#[repr(u16)]
pub enum OpCode {
    Error = 0,
    Sysinfo = 1,
    WindowChanged = 2,
    Workspace = 3,
    MediaPlayer = 4,
    Volume = 5,
}

/// A single decoded frame of the backend stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Error(BackendError),
    Sysinfo(SysinfoSnapshot),
    WindowChanged(WindowChanged),
    Workspace(WorkspaceEvent),
    MediaPlayer(MediaEvent),
    Volume(VolumeEvent),
}

impl Envelope {
    pub fn op(&self) -> OpCode {
        match self {
            Envelope::Error(_) => OpCode::Error,
            Envelope::Sysinfo(_) => OpCode::Sysinfo,
            Envelope::WindowChanged(_) => OpCode::WindowChanged,
            Envelope::Workspace(_) => OpCode::Workspace,
            Envelope::MediaPlayer(_) => OpCode::MediaPlayer,
            Envelope::Volume(_) => OpCode::Volume,
        }
    }

    /// Serialize this envelope into a single line of the wire format (without the trailing newline).
    pub fn to_line(&self) -> serde_json::Result<String> {
        fn line<T: Serialize>(op: OpCode, data: &T) -> serde_json::Result<String> {
            serde_json::to_string(&RawEnvelopeRef { op: op as u16, data })
        }
        match self {
            Envelope::Error(x) => line(self.op(), x),
            Envelope::Sysinfo(x) => line(self.op(), x),
            Envelope::WindowChanged(x) => line(self.op(), x),
            Envelope::Workspace(x) => line(self.op(), x),
            Envelope::MediaPlayer(x) => line(self.op(), x),
            Envelope::Volume(x) => line(self.op(), x),
        }
    }
}

#[derive(Deserialize)]
struct RawEnvelope {
    op: i64,
    data: serde_json::Value,
}

#[derive(Serialize)]
struct RawEnvelopeRef<'a, T> {
    op: u16,
    data: &'a T,
}

/// Decode a single line of the backend stream. This is pure; failures never affect later lines.
pub fn decode(line: &[u8]) -> Result<Envelope, DecodeError> {
    let raw: RawEnvelope = serde_json::from_slice(line).map_err(DecodeError::Malformed)?;
    let op = u16::try_from(raw.op).ok().and_then(OpCode::from_repr).ok_or(DecodeError::UnknownOperation(raw.op))?;

    fn body<T: serde::de::DeserializeOwned>(op: OpCode, data: serde_json::Value) -> Result<T, DecodeError> {
        serde_json::from_value(data).map_err(|source| DecodeError::BodyMismatch { op, source })
    }

    Ok(match op {
        OpCode::Error => Envelope::Error(BackendError(raw.data)),
        OpCode::Sysinfo => Envelope::Sysinfo(body(op, raw.data)?),
        OpCode::WindowChanged => Envelope::WindowChanged(body(op, raw.data)?),
        OpCode::Workspace => Envelope::Workspace(body(op, raw.data)?),
        OpCode::MediaPlayer => Envelope::MediaPlayer(body(op, raw.data)?),
        OpCode::Volume => Envelope::Volume(body(op, raw.data)?),
    })
}
