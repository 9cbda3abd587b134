use std::sync::Arc;

use skadi_payload::Envelope;
use tokio::task::JoinHandle;

use crate::{
    descriptor::{CommandDescriptor, Invocation, Mode},
    error::{CommandDeliveryError, ProcessError},
    process_bridge::ProcessBridge,
    registry::{ListenerRegistry, SubscriptionHandle},
};

/// Outcome of [`CommandDispatcher::invoke`].
#[derive(Debug)]
pub enum Invoked {
    /// Standard output of a resolving one-shot command.
    Output(String),
    /// A fire-and-forget command was started; nobody will see its result.
    Detached,
    /// A polling command is running for as long as this handle is kept.
    Listening(SubscriptionHandle),
}

/// The command surface used by widgets to affect the outside world.
#[derive(Clone)]
pub struct CommandDispatcher {
    bridge: Arc<dyn ProcessBridge>,
    registry: ListenerRegistry,
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher").field("registry", &self.registry).finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Create a dispatcher together with its own [`ListenerRegistry`]. Must be called within a tokio runtime.
    pub fn new(bridge: Arc<dyn ProcessBridge>) -> Self {
        let registry = ListenerRegistry::spawn(bridge.clone());
        Self { bridge, registry }
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Run a one-shot command to completion and return its standard output.
    pub async fn exec(&self, descriptor: &CommandDescriptor) -> Result<String, ProcessError> {
        if descriptor.mode != Mode::OneShot {
            log::warn!("Running polling command `{}` as a one-shot command", descriptor);
        }
        self.bridge.run_once(descriptor).await
    }

    /// Run a command without waiting for it. Failures are logged and never reach the caller.
    pub fn fire(&self, descriptor: CommandDescriptor) -> JoinHandle<()> {
        let run = self.bridge.run_once(&descriptor);
        tokio::spawn(async move {
            let result = run.await.map_err(CommandDeliveryError::from);
            crate::print_result_err!(format!("while running `{}`", descriptor), result);
        })
    }

    /// Subscribe to the frames of a polling command.
    pub fn listen(&self, descriptor: CommandDescriptor, on_frame: impl FnMut(&Envelope) + Send + 'static) -> SubscriptionHandle {
        self.registry.subscribe(descriptor, on_frame)
    }

    /// Run a command the way it was requested: polling commands are registered with the
    /// listener registry, one-shot commands either resolve to their output or are detached.
    pub async fn invoke(&self, invocation: Invocation) -> Result<Invoked, ProcessError> {
        let Invocation { descriptor, resolves } = invocation;
        match descriptor.mode {
            Mode::Polling => Ok(Invoked::Listening(self.registry.subscribe(descriptor, |_| {}))),
            Mode::OneShot if resolves => self.exec(&descriptor).await.map(Invoked::Output),
            Mode::OneShot => {
                self.fire(descriptor);
                Ok(Invoked::Detached)
            }
        }
    }
}
