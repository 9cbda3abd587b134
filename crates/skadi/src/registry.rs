//! Fan-out of backend streams to subscribers.
//!
//! The registry runs as a single actor task which exclusively owns the process table.
//! Every mutation (subscribe, unsubscribe, spawn, teardown) and every frame delivery goes
//! through its message queue, so a descriptor's frames reach its subscribers in emission order
//! and the reference counts are never raced.
//!
//! One process is started per distinct [`CommandDescriptor`] when its first subscriber arrives,
//! and torn down when the last [`SubscriptionHandle`] is released or dropped.
//! A stream whose process exits on its own is not restarted; its subscribers see
//! [`StreamStatus::Dead`] and keep whatever state they last derived.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use serde::{Deserialize, Serialize};
use skadi_payload::Envelope;
use tokio::sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender},
    oneshot, watch,
};

use crate::{
    descriptor::CommandDescriptor,
    process_bridge::{ProcessBridge, StreamEvent, StreamHandle},
};

/// Invoked with every decoded frame of the subscribed stream.
pub type FrameCallback = Box<dyn FnMut(&Envelope) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamStatus {
    Running,
    /// The stream will not deliver any further frames.
    Dead(String),
}

impl StreamStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, StreamStatus::Running)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub running_streams: usize,
    pub subscriptions: usize,
    pub frames_delivered: u64,
    pub decode_failures: u64,
}

enum RegistryMsg {
    Subscribe { id: SubscriptionId, descriptor: CommandDescriptor, on_frame: FrameCallback, status: watch::Sender<StreamStatus> },
    Unsubscribe(SubscriptionId),
    Stream { stream_id: u64, event: StreamEvent },
    Stats(oneshot::Sender<RegistryStats>),
    StopAll(oneshot::Sender<()>),
}

/// Handle to the registry actor. Cheap to clone.
#[derive(Clone)]
pub struct ListenerRegistry {
    msg_send: UnboundedSender<RegistryMsg>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry").finish_non_exhaustive()
    }
}

impl ListenerRegistry {
    /// Start the registry actor on the current tokio runtime.
    pub fn spawn(bridge: Arc<dyn ProcessBridge>) -> Self {
        let (msg_send, msg_recv) = mpsc::unbounded_channel();
        let actor = RegistryActor {
            bridge,
            msg_send: msg_send.downgrade(),
            streams: HashMap::new(),
            subscriptions: HashMap::new(),
            next_stream_id: 0,
            frames_delivered: 0,
            decode_failures: 0,
        };
        tokio::spawn(actor.run(msg_recv));
        Self { msg_send, next_id: Arc::new(AtomicU64::new(0)) }
    }

    /// Register `on_frame` for every frame of the stream identified by `descriptor`,
    /// starting the stream if nobody is subscribed to it yet.
    pub fn subscribe(&self, descriptor: CommandDescriptor, on_frame: impl FnMut(&Envelope) + Send + 'static) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (status_send, status_recv) = watch::channel(StreamStatus::Running);
        let msg = RegistryMsg::Subscribe { id, descriptor: descriptor.clone(), on_frame: Box::new(on_frame), status: status_send };
        if self.msg_send.send(msg).is_err() {
            log::error!("Listener registry is no longer running, cannot subscribe to `{}`", descriptor);
        }
        SubscriptionHandle { id, descriptor, msg_send: self.msg_send.clone(), status: status_recv, active: true }
    }

    /// Remove exactly one registration. Equivalent to [`SubscriptionHandle::unsubscribe`].
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        handle.unsubscribe();
    }

    /// Counters of the registry. Since messages are handled in order, this also waits for
    /// all previously issued subscribe/unsubscribe calls to be processed.
    pub async fn stats(&self) -> RegistryStats {
        let (send, recv) = oneshot::channel();
        if self.msg_send.send(RegistryMsg::Stats(send)).is_err() {
            return RegistryStats::default();
        }
        recv.await.unwrap_or_default()
    }

    /// Tear down every stream and wait until their processes are gone.
    pub async fn stop_all(&self) {
        let (send, recv) = oneshot::channel();
        if self.msg_send.send(RegistryMsg::StopAll(send)).is_ok() {
            let _ = recv.await;
        }
    }
}

/// A single registration with the [`ListenerRegistry`]. Released on drop.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    descriptor: CommandDescriptor,
    msg_send: UnboundedSender<RegistryMsg>,
    status: watch::Receiver<StreamStatus>,
    active: bool,
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("descriptor", &self.descriptor)
            .field("status", &*self.status.borrow())
            .finish()
    }
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    pub fn status(&self) -> StreamStatus {
        self.status.borrow().clone()
    }

    /// A receiver that is notified whenever the status of the underlying stream changes.
    pub fn status_receiver(&self) -> watch::Receiver<StreamStatus> {
        self.status.clone()
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.active) {
            // the registry being gone already means there is nothing left to release
            let _ = self.msg_send.send(RegistryMsg::Unsubscribe(self.id));
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

struct Subscriber {
    id: SubscriptionId,
    on_frame: FrameCallback,
    status: watch::Sender<StreamStatus>,
}

struct Stream {
    id: u64,
    handle: Option<StreamHandle>,
    status: StreamStatus,
    subscribers: Vec<Subscriber>,
}

impl Stream {
    fn set_status(&mut self, status: StreamStatus) {
        for subscriber in &self.subscribers {
            subscriber.status.send_replace(status.clone());
        }
        self.status = status;
    }
}

struct RegistryActor {
    bridge: Arc<dyn ProcessBridge>,
    msg_send: WeakUnboundedSender<RegistryMsg>,
    streams: HashMap<CommandDescriptor, Stream>,
    subscriptions: HashMap<SubscriptionId, CommandDescriptor>,
    next_stream_id: u64,
    frames_delivered: u64,
    decode_failures: u64,
}

impl RegistryActor {
    async fn run(mut self, mut msg_recv: UnboundedReceiver<RegistryMsg>) {
        while let Some(msg) = msg_recv.recv().await {
            match msg {
                RegistryMsg::Subscribe { id, descriptor, on_frame, status } => self.subscribe(id, descriptor, on_frame, status),
                RegistryMsg::Unsubscribe(id) => self.unsubscribe(id),
                RegistryMsg::Stream { stream_id, event } => self.handle_stream_event(stream_id, event),
                RegistryMsg::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
                RegistryMsg::StopAll(reply) => {
                    self.stop_all().await;
                    let _ = reply.send(());
                }
            }
        }
        log::debug!("All registry handles dropped, stopping listener registry");
        self.stop_all().await;
    }

    fn subscribe(
        &mut self,
        id: SubscriptionId,
        descriptor: CommandDescriptor,
        on_frame: FrameCallback,
        status: watch::Sender<StreamStatus>,
    ) {
        if !self.streams.contains_key(&descriptor) {
            let stream = self.start_stream(&descriptor);
            self.streams.insert(descriptor.clone(), stream);
        }
        if let Some(stream) = self.streams.get_mut(&descriptor) {
            status.send_replace(stream.status.clone());
            stream.subscribers.push(Subscriber { id, on_frame, status });
            log::debug!("Subscription {:?} to `{}` ({} subscribers)", id, descriptor, stream.subscribers.len());
        }
        self.subscriptions.insert(id, descriptor);
    }

    fn start_stream(&mut self, descriptor: &CommandDescriptor) -> Stream {
        let stream_id = self.next_stream_id;
        self.next_stream_id += 1;

        let msg_send = self.msg_send.clone();
        let on_event = Box::new(move |event| {
            if let Some(msg_send) = msg_send.upgrade() {
                let _ = msg_send.send(RegistryMsg::Stream { stream_id, event });
            }
        });

        match self.bridge.spawn_stream(descriptor, on_event) {
            Ok(handle) => {
                log::info!("Started stream `{}`", descriptor);
                Stream { id: stream_id, handle: Some(handle), status: StreamStatus::Running, subscribers: Vec::new() }
            }
            Err(err) => {
                log::error!("Failed to start stream `{}`: {}", descriptor, err);
                Stream { id: stream_id, handle: None, status: StreamStatus::Dead(err.to_string()), subscribers: Vec::new() }
            }
        }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        let Some(descriptor) = self.subscriptions.remove(&id) else {
            return;
        };
        let Some(stream) = self.streams.get_mut(&descriptor) else {
            return;
        };
        stream.subscribers.retain(|subscriber| subscriber.id != id);
        log::debug!("Removed subscription {:?} to `{}` ({} left)", id, descriptor, stream.subscribers.len());

        if stream.subscribers.is_empty() {
            if let Some(stream) = self.streams.remove(&descriptor) {
                if let Some(handle) = stream.handle {
                    log::info!("Stopping stream `{}`, no subscribers left", descriptor);
                    tokio::spawn(handle.shutdown());
                }
            }
        }
    }

    fn handle_stream_event(&mut self, stream_id: u64, event: StreamEvent) {
        // events of a stream that was already torn down are stale
        let Some((descriptor, stream)) = self.streams.iter_mut().find(|(_, stream)| stream.id == stream_id) else {
            return;
        };

        match event {
            StreamEvent::Line(line) => match skadi_payload::decode(&line) {
                Ok(envelope) => {
                    for subscriber in stream.subscribers.iter_mut() {
                        (subscriber.on_frame)(&envelope);
                    }
                    self.frames_delivered += 1;
                }
                Err(err) => {
                    self.decode_failures += 1;
                    log::warn!("Skipping undecodable frame from `{}`: {}", descriptor, err);
                }
            },
            StreamEvent::Exited(err) => {
                log::error!("Stream `{}` died: {}", descriptor, err);
                stream.handle = None;
                stream.set_status(StreamStatus::Dead(err.to_string()));
            }
        }
    }

    fn stats(&self) -> RegistryStats {
        RegistryStats {
            running_streams: self.streams.values().filter(|stream| stream.status.is_running()).count(),
            subscriptions: self.subscriptions.len(),
            frames_delivered: self.frames_delivered,
            decode_failures: self.decode_failures,
        }
    }

    async fn stop_all(&mut self) {
        self.subscriptions.clear();
        let shutdowns: Vec<_> = self
            .streams
            .drain()
            .filter_map(|(descriptor, mut stream)| {
                stream.set_status(StreamStatus::Dead("stopped".to_string()));
                log::debug!("Stopping stream `{}`", descriptor);
                stream.handle.take().map(StreamHandle::shutdown)
            })
            .collect();
        futures::future::join_all(shutdowns).await;
    }
}
