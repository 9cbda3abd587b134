use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use skadi_payload::{Envelope, VolumeEvent, WorkspaceId};
use tokio::sync::{
    mpsc::{UnboundedReceiver, UnboundedSender},
    watch,
};

use crate::{
    coalescer::{self, CoalescerHandle},
    commands::{self, PlayerAction},
    config::SkadiConfig,
    daemon_response::DaemonResponseSender,
    dispatch::CommandDispatcher,
    reducer::{workspaces::query_workspaces, MediaState, Reducer, Reducers, SnapshotDelta, SysinfoState, WorkspaceSet},
    registry::{StreamStatus, SubscriptionHandle},
};

/// How long a startup query may run before the bar gives up on it and starts without its result.
pub const STARTUP_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// An event the bar task reacts to. Sent by the IPC server, the backend stream and startup queries.
#[derive(Debug)]
pub enum BarCommand {
    NoOp,
    Frame(Envelope),
    WorkspacesQueried(Result<WorkspaceSet>),
    VolumeQueried(Result<u8>),
    SetVolume(u8),
    SwitchWorkspace(WorkspaceId),
    Media(PlayerAction),
    PowerMenu,
    PrintState(DaemonResponseSender),
    KillServer,
}

/// Everything the presentation layer gets to see. Published after every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSnapshot {
    pub workspaces: WorkspaceSet,
    pub workspaces_ready: bool,
    pub media: MediaState,
    pub volume: u8,
    pub sysinfo: SysinfoState,
    pub backend: StreamStatus,
}

/// Owner of all domain state. Runs on a single task, so none of the reducers need locking.
pub struct Bar {
    pub config: SkadiConfig,
    reducers: Reducers,
    dispatcher: CommandDispatcher,
    volume_send: CoalescerHandle<u8>,
    backend: Option<SubscriptionHandle>,
    snapshot_send: watch::Sender<BarSnapshot>,
    evt_send: UnboundedSender<BarCommand>,
    exiting: bool,
}

impl std::fmt::Debug for Bar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bar").field("config", &self.config).field("backend", &self.backend).finish_non_exhaustive()
    }
}

impl Bar {
    /// Subscribe to the backend stream and start the startup queries.
    /// Their results arrive as [`BarCommand`]s on the channel `evt_send` belongs to.
    pub fn start(
        config: SkadiConfig,
        dispatcher: CommandDispatcher,
        evt_send: UnboundedSender<BarCommand>,
    ) -> (Self, watch::Receiver<BarSnapshot>) {
        let volume_send = {
            let dispatcher = dispatcher.clone();
            coalescer::spawn(config.volume_debounce(), config.volume_throttle(), move |volume: u8| {
                log::debug!("Setting volume to {}%", volume);
                dispatcher.fire(commands::set_volume(volume));
            })
        };

        let backend = {
            let evt_send = evt_send.clone();
            let descriptor = commands::backend_stream(&config.backend, config.sysinfo_poll_interval);
            log::info!("Listening to backend: {}", descriptor);
            dispatcher.listen(descriptor, move |envelope| {
                let _ = evt_send.send(BarCommand::Frame(envelope.clone()));
            })
        };

        tokio::spawn({
            let dispatcher = dispatcher.clone();
            let evt_send = evt_send.clone();
            async move {
                let result = with_startup_timeout("workspace", query_workspaces(&dispatcher)).await;
                let _ = evt_send.send(BarCommand::WorkspacesQueried(result));
            }
        });
        tokio::spawn({
            let dispatcher = dispatcher.clone();
            let evt_send = evt_send.clone();
            async move {
                let result = with_startup_timeout("volume", query_volume(&dispatcher)).await;
                let _ = evt_send.send(BarCommand::VolumeQueried(result));
            }
        });

        let reducers = Reducers::new(config.network_history_len);
        let (snapshot_send, snapshot_recv) = watch::channel(snapshot_of(&reducers, Some(&backend)));
        let bar = Bar { config, reducers, dispatcher, volume_send, backend: Some(backend), snapshot_send, evt_send, exiting: false };
        (bar, snapshot_recv)
    }

    pub fn evt_send(&self) -> &UnboundedSender<BarCommand> {
        &self.evt_send
    }

    pub fn snapshot(&self) -> BarSnapshot {
        snapshot_of(&self.reducers, self.backend.as_ref())
    }

    fn backend_status(&self) -> StreamStatus {
        backend_status(self.backend.as_ref())
    }

    fn publish(&mut self) {
        self.snapshot_send.send_replace(self.snapshot());
    }

    pub fn handle_command(&mut self, event: BarCommand) {
        log::trace!("Handling event: {:?}", &event);
        let result = self.try_handle_command(event);
        crate::print_result_err!("while handling event", &result);
    }

    fn try_handle_command(&mut self, event: BarCommand) -> Result<()> {
        match event {
            BarCommand::NoOp => {}
            BarCommand::Frame(envelope) => {
                if let Some(delta) = self.reducers.apply(&envelope) {
                    self.on_delta(delta);
                }
            }
            BarCommand::WorkspacesQueried(result) => {
                let set = result.unwrap_or_else(|err| {
                    log::error!("Failed to query workspaces, starting without any: {:?}", err);
                    WorkspaceSet::default()
                });
                let seeded = self.reducers.workspaces.seed(set.ids().iter().copied(), set.active());
                log::info!("Workspaces initialized: {:?}, active: {:?}", seeded.ids(), seeded.active());
                self.publish();
            }
            BarCommand::VolumeQueried(Ok(volume)) => {
                if let Some(delta) = self.reducers.volume.apply_frame(&VolumeEvent { volume: volume.into() }) {
                    self.on_delta(SnapshotDelta::Volume(delta));
                }
            }
            BarCommand::VolumeQueried(Err(err)) => log::warn!("Failed to query volume: {:?}", err),
            BarCommand::SetVolume(volume) => {
                if let Some(delta) = self.reducers.volume.set_local(volume.into()) {
                    self.on_delta(SnapshotDelta::Volume(delta));
                }
                self.volume_send.submit(volume);
            }
            BarCommand::SwitchWorkspace(id) => {
                self.dispatcher.fire(commands::switch_workspace(id));
            }
            BarCommand::Media(action) => {
                self.dispatcher.fire(commands::media_control(&self.config.player, action));
            }
            BarCommand::PowerMenu => {
                self.dispatcher.fire(commands::power_menu());
            }
            BarCommand::PrintState(sender) => {
                let state = serde_json::to_string_pretty(&self.snapshot()).map_err(anyhow::Error::from);
                sender.respond_with_result(state)?;
            }
            BarCommand::KillServer => {
                log::info!("Received kill command, stopping bar");
                self.exiting = true;
                if crate::application_lifecycle::send_exit().is_err() {
                    log::debug!("No other task was waiting for the exit event");
                }
            }
        }
        Ok(())
    }

    fn on_delta(&mut self, delta: SnapshotDelta) {
        log::trace!("State changed: {:?}", delta);
        self.publish();
    }

    /// Process commands until the bar is killed, then stop all streams.
    pub async fn run(mut self, mut evt_recv: UnboundedReceiver<BarCommand>) {
        let mut status_recv = self.backend.as_ref().map(SubscriptionHandle::status_receiver);
        while !self.exiting {
            tokio::select! {
                Some(event) = evt_recv.recv() => self.handle_command(event),
                Some(Ok(())) = changed(&mut status_recv) => {
                    let status = self.backend_status();
                    match &status {
                        StreamStatus::Running => log::info!("Backend stream running"),
                        StreamStatus::Dead(reason) => log::error!("Backend stream died, keeping last known state: {}", reason),
                    }
                    self.publish();
                }
                else => break,
            }
        }
        self.stop().await;
    }

    async fn stop(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.unsubscribe();
        }
        self.dispatcher.registry().stop_all().await;
        self.publish();
        log::info!("Bar stopped");
    }
}

async fn changed(status_recv: &mut Option<watch::Receiver<StreamStatus>>) -> Option<Result<(), watch::error::RecvError>> {
    match status_recv {
        Some(recv) => Some(recv.changed().await),
        None => std::future::pending().await,
    }
}

fn snapshot_of(reducers: &Reducers, backend: Option<&SubscriptionHandle>) -> BarSnapshot {
    BarSnapshot {
        workspaces: reducers.workspaces.snapshot(),
        workspaces_ready: reducers.workspaces.is_ready(),
        media: reducers.media.snapshot(),
        volume: reducers.volume.snapshot(),
        sysinfo: reducers.sysinfo.snapshot(),
        backend: backend_status(backend),
    }
}

fn backend_status(backend: Option<&SubscriptionHandle>) -> StreamStatus {
    match backend {
        Some(handle) => handle.status(),
        None => StreamStatus::Dead("unsubscribed".to_string()),
    }
}

async fn query_volume(dispatcher: &CommandDispatcher) -> Result<u8> {
    let output = dispatcher.exec(&commands::get_volume()).await?;
    commands::parse_volume(&output).ok_or_else(|| anyhow::anyhow!("No volume found in `{}`", output.trim()))
}

async fn with_startup_timeout<T>(what: &str, query: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(STARTUP_QUERY_TIMEOUT, query).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!("The {} query did not finish within {:?}", what, STARTUP_QUERY_TIMEOUT)),
    }
}
