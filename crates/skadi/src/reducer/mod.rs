//! Per-domain state folded from the backend frame stream.

use serde::Serialize;
use skadi_payload::{Envelope, SysinfoSnapshot};

pub mod media;
pub mod sysinfo;
pub mod volume;
pub mod workspaces;

pub use media::{MediaChange, MediaReducer, MediaState};
pub use sysinfo::{NetworkHistory, NetworkSample, SysinfoReducer, SysinfoState};
pub use volume::VolumeReducer;
pub use workspaces::{WorkspaceReducer, WorkspaceSet};

/// A stateful fold over the frames of one domain.
///
/// `apply_frame` returns `None` when the frame did not change anything observable. Reducers never
/// fail: a frame that cannot be interpreted is ignored.
pub trait Reducer {
    type Frame;
    type Delta;
    type Snapshot;

    fn apply_frame(&mut self, frame: &Self::Frame) -> Option<Self::Delta>;

    fn snapshot(&self) -> Self::Snapshot;
}

/// What changed after a frame was folded, tagged by domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "domain", content = "change")]
pub enum SnapshotDelta {
    Workspaces(WorkspaceSet),
    Media(Vec<MediaChange>),
    Volume(u8),
    Sysinfo(NetworkSample),
}

/// All domain reducers, with frames routed by operation tag.
#[derive(Debug)]
pub struct Reducers {
    pub workspaces: WorkspaceReducer,
    pub media: MediaReducer,
    pub volume: VolumeReducer,
    pub sysinfo: SysinfoReducer,
}

impl Reducers {
    pub fn new(network_history_len: usize) -> Self {
        Self {
            workspaces: WorkspaceReducer::default(),
            media: MediaReducer::default(),
            volume: VolumeReducer::default(),
            sysinfo: SysinfoReducer::new(network_history_len),
        }
    }

    pub fn apply(&mut self, envelope: &Envelope) -> Option<SnapshotDelta> {
        match envelope {
            Envelope::Workspace(event) => self.workspaces.apply_frame(event).map(SnapshotDelta::Workspaces),
            Envelope::MediaPlayer(event) => self.media.apply_frame(event).map(SnapshotDelta::Media),
            Envelope::Volume(event) => self.volume.apply_frame(event).map(SnapshotDelta::Volume),
            Envelope::Sysinfo(snapshot) => self.sysinfo.apply_frame(snapshot).map(SnapshotDelta::Sysinfo),
            Envelope::Error(err) => {
                log::warn!("Backend reported an error: {}", err);
                None
            }
            Envelope::WindowChanged(_) => None,
        }
    }

    pub fn sysinfo_snapshot(&self) -> Option<&SysinfoSnapshot> {
        self.sysinfo.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use skadi_payload::{BackendError, VolumeEvent, WindowChanged, WorkspaceEvent, WorkspaceEventKind, WorkspaceId};

    #[test]
    fn test_routes_by_operation() {
        let mut reducers = Reducers::new(30);
        reducers.workspaces.seed([WorkspaceId(1)], Some(WorkspaceId(1)));

        let delta = reducers.apply(&Envelope::Workspace(WorkspaceEvent::new(WorkspaceId(2), WorkspaceEventKind::Created)));
        assert_eq!(
            delta,
            Some(SnapshotDelta::Workspaces(WorkspaceSet::new(btreeset! {WorkspaceId(1), WorkspaceId(2)}, Some(WorkspaceId(1)))))
        );
        assert_eq!(reducers.apply(&Envelope::Volume(VolumeEvent { volume: 42 })), Some(SnapshotDelta::Volume(42)));
        assert_eq!(reducers.volume.snapshot(), 42);
    }

    #[test]
    fn test_unused_operations_change_nothing() {
        let mut reducers = Reducers::new(30);
        assert_eq!(reducers.apply(&Envelope::WindowChanged(WindowChanged { title: "kitty".to_string() })), None);
        assert_eq!(reducers.apply(&Envelope::Error(BackendError(serde_json::json!({"Io": "broken pipe"})))), None);
        assert_eq!(reducers.sysinfo_snapshot(), None);
    }
}
