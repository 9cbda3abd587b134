//! Operation-specific bodies carried inside an [`crate::Envelope`].

use serde::{Deserialize, Serialize};

use crate::WorkspaceId;

/// System metrics as sampled by the backend. All sizes are bytes, all rates are bytes per second.
///
/// `memory_free` and `disk_free` are reported by the backend independently of `*_used`
/// and must not be derived from `total - used`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SysinfoSnapshot {
    pub cpu_usage: f32,
    pub memory_used: u64,
    pub memory_total: u64,
    pub memory_free: u64,
    pub swap_used: u64,
    pub swap_total: u64,
    pub network_rx: u64,
    pub network_tx: u64,
    pub disk_read: u64,
    pub disk_write: u64,
    #[serde(rename = "diskUsage")]
    pub disk_used: u64,
    pub disk_total: u64,
    pub disk_free: u64,
}

impl SysinfoSnapshot {
    pub fn memory_used_perc(&self) -> f32 {
        percentage(self.memory_used, self.memory_total)
    }

    pub fn disk_used_perc(&self) -> f32 {
        percentage(self.disk_used, self.disk_total)
    }
}

fn percentage(part: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64 * 100.0) as f32
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowChanged {
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceEventKind {
    Moved,
    Created,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceEvent {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: WorkspaceEventKind,
}

impl WorkspaceEvent {
    pub fn new(id: WorkspaceId, kind: WorkspaceEventKind) -> Self {
        Self { id: id.0 as i64, kind }
    }

    pub fn workspace_id(&self) -> Option<WorkspaceId> {
        WorkspaceId::from_raw(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub status: String,
    /// Playback position as reported by the player (MPRIS reports microseconds).
    pub position: Option<u64>,
    /// Track length, in the same unit as `position`.
    pub duration: Option<u64>,
    pub volume: Option<String>,
    pub artwork_url: Option<String>,
}

impl TrackInfo {
    /// Fraction of the track that has been played, if both position and duration are known.
    pub fn progress(&self) -> Option<f64> {
        match (self.position, self.duration) {
            (Some(position), Some(duration)) if duration > 0 => Some((position as f64 / duration as f64).min(1.0)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEventKind {
    Request,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEvent {
    #[serde(rename = "type")]
    pub kind: MediaEventKind,
    pub track_info: Option<TrackInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeEvent {
    pub volume: i64,
}

/// Diagnostic emitted by the backend. Its shape is not part of the contract, so it is kept as raw json.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendError(pub serde_json::Value);

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            serde_json::Value::String(s) => write!(f, "{}", s),
            other => write!(f, "{}", other),
        }
    }
}
