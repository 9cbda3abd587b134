use std::collections::BTreeSet;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use skadi_payload::{WorkspaceEvent, WorkspaceEventKind, WorkspaceId};

use super::Reducer;
use crate::{commands, dispatch::CommandDispatcher};

/// The known workspaces and the active one.
///
/// Whenever `ids` is non-empty, `active` is `Some` and a member of `ids`. When `ids` is empty, `active` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkspaceSet {
    ids: BTreeSet<WorkspaceId>,
    active: Option<WorkspaceId>,
}

impl WorkspaceSet {
    /// Build a set from query results. An active id missing from `ids` is inserted;
    /// without an active id, the smallest one becomes active.
    pub fn new(ids: impl IntoIterator<Item = WorkspaceId>, active: Option<WorkspaceId>) -> Self {
        let mut ids: BTreeSet<_> = ids.into_iter().collect();
        if let Some(active) = active {
            ids.insert(active);
        }
        let active = active.or_else(|| ids.first().copied());
        Self { ids, active }
    }

    pub fn ids(&self) -> &BTreeSet<WorkspaceId> {
        &self.ids
    }

    pub fn active(&self) -> Option<WorkspaceId> {
        self.active
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Compute the set after `event`, or `None` if the event changes nothing.
    /// Events with a non-positive id are ignored.
    pub fn after(&self, event: &WorkspaceEvent) -> Option<WorkspaceSet> {
        let Some(id) = event.workspace_id() else {
            log::debug!("Ignoring workspace event for invalid id {}", event.id);
            return None;
        };
        let mut next = self.clone();
        match event.kind {
            WorkspaceEventKind::Created => {
                if !next.ids.insert(id) {
                    return None;
                }
                next.active.get_or_insert(id);
            }
            WorkspaceEventKind::Destroyed => {
                if !next.ids.remove(&id) {
                    return None;
                }
                if next.active == Some(id) {
                    next.active = next.ids.first().copied();
                }
            }
            WorkspaceEventKind::Moved => {
                if next.active == Some(id) {
                    return None;
                }
                next.ids.insert(id);
                next.active = Some(id);
            }
        }
        Some(next)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WorkspaceReducerState {
    /// Waiting for the startup query. Events received so far are replayed once it completes.
    Uninitialized { queued: Vec<WorkspaceEvent> },
    Ready(WorkspaceSet),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceReducer {
    state: WorkspaceReducerState,
}

impl Default for WorkspaceReducer {
    fn default() -> Self {
        Self { state: WorkspaceReducerState::Uninitialized { queued: Vec::new() } }
    }
}

impl WorkspaceReducer {
    pub fn is_ready(&self) -> bool {
        matches!(self.state, WorkspaceReducerState::Ready(_))
    }

    /// Mark the reducer as ready, starting from the given query results, and replay queued events.
    /// Seeding an already ready reducer replaces its state.
    pub fn seed(&mut self, ids: impl IntoIterator<Item = WorkspaceId>, active: Option<WorkspaceId>) -> WorkspaceSet {
        let mut set = WorkspaceSet::new(ids, active);
        if let WorkspaceReducerState::Uninitialized { queued } = &self.state {
            log::debug!("Replaying {} workspace events received before initialization", queued.len());
            for event in queued {
                if let Some(next) = set.after(event) {
                    set = next;
                }
            }
        }
        self.state = WorkspaceReducerState::Ready(set.clone());
        set
    }
}

impl Reducer for WorkspaceReducer {
    type Delta = WorkspaceSet;
    type Frame = WorkspaceEvent;
    type Snapshot = WorkspaceSet;

    fn apply_frame(&mut self, event: &WorkspaceEvent) -> Option<WorkspaceSet> {
        match &mut self.state {
            WorkspaceReducerState::Uninitialized { queued } => {
                queued.push(*event);
                None
            }
            WorkspaceReducerState::Ready(set) => {
                let next = set.after(event)?;
                *set = next.clone();
                Some(next)
            }
        }
    }

    fn snapshot(&self) -> WorkspaceSet {
        match &self.state {
            WorkspaceReducerState::Uninitialized { .. } => WorkspaceSet::default(),
            WorkspaceReducerState::Ready(set) => set.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HyprWorkspace {
    id: i64,
}

/// Query the compositor for the existing workspaces and the active one.
///
/// Fails if the workspace listing fails. A failing active-workspace query is only logged,
/// in which case the smallest workspace becomes active.
pub async fn query_workspaces(dispatcher: &CommandDispatcher) -> Result<WorkspaceSet> {
    let listing = dispatcher.exec(&commands::list_workspaces()).await?;
    let listing: Vec<HyprWorkspace> = serde_json::from_str(&listing).context("Failed to parse workspace listing")?;

    let active = match dispatcher.exec(&commands::active_workspace()).await {
        Ok(output) => match serde_json::from_str::<HyprWorkspace>(&output) {
            Ok(workspace) => WorkspaceId::from_raw(workspace.id),
            Err(err) => {
                log::warn!("Failed to parse active workspace: {}", err);
                None
            }
        },
        Err(err) => {
            log::warn!("Failed to query active workspace: {}", err);
            None
        }
    };

    Ok(WorkspaceSet::new(listing.into_iter().filter_map(|workspace| WorkspaceId::from_raw(workspace.id)), active))
}
