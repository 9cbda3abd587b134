use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

/// Identifier of a compositor workspace. Always strictly positive.
#[repr(transparent)]
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, From)]
#[serde(transparent)]
pub struct WorkspaceId(pub u32);

impl WorkspaceId {
    /// Convert a raw id as it appears on the wire. Returns `None` for ids that are not strictly positive,
    /// which covers the backend's `0` parse-failure sentinel and compositor "special" workspaces.
    pub fn from_raw(raw: i64) -> Option<Self> {
        u32::try_from(raw).ok().filter(|id| *id > 0).map(WorkspaceId)
    }
}

impl std::fmt::Debug for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WorkspaceId({})", self.0)
    }
}
