#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use futures::{future::BoxFuture, FutureExt};
use skadi::{
    process_bridge::LineHandler, CommandDescriptor, ProcessBridge, ProcessError, StreamEvent, StreamHandle,
};
use skadi_payload::Envelope;
use tokio_util::sync::CancellationToken;

/// A [`ProcessBridge`] that never starts a process. Streams are driven by hand and every call is recorded.
#[derive(Default)]
pub struct FakeBridge {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    streams: Vec<FakeStream>,
    runs: Vec<CommandDescriptor>,
    outputs: HashMap<CommandDescriptor, Result<String, i32>>,
    unspawnable: HashSet<String>,
    hanging: HashSet<CommandDescriptor>,
}

struct FakeStream {
    descriptor: CommandDescriptor,
    on_event: LineHandler,
    cancel: CancellationToken,
}

impl FakeBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `run_once` of `descriptor` succeed with `output`.
    pub fn set_output(&self, descriptor: CommandDescriptor, output: &str) {
        self.state.lock().unwrap().outputs.insert(descriptor, Ok(output.to_string()));
    }

    /// Make `run_once` of `descriptor` exit with `code`.
    pub fn set_exit_code(&self, descriptor: CommandDescriptor, code: i32) {
        self.state.lock().unwrap().outputs.insert(descriptor, Err(code));
    }

    /// Make `run_once` of `descriptor` never finish.
    pub fn hang(&self, descriptor: CommandDescriptor) {
        self.state.lock().unwrap().hanging.insert(descriptor);
    }

    /// Make every spawn of `executable` fail.
    pub fn fail_spawns_of(&self, executable: &str) {
        self.state.lock().unwrap().unspawnable.insert(executable.to_string());
    }

    pub fn spawn_count(&self) -> usize {
        self.state.lock().unwrap().streams.len()
    }

    pub fn spawned(&self) -> Vec<CommandDescriptor> {
        self.state.lock().unwrap().streams.iter().map(|stream| stream.descriptor.clone()).collect()
    }

    /// Number of streams that were torn down by their owner.
    pub fn terminated_count(&self) -> usize {
        self.state.lock().unwrap().streams.iter().filter(|stream| stream.cancel.is_cancelled()).count()
    }

    pub fn runs(&self) -> Vec<CommandDescriptor> {
        self.state.lock().unwrap().runs.clone()
    }

    /// Write a raw line to the standard output of the `index`th spawned stream.
    pub fn emit_line(&self, index: usize, line: &str) {
        let state = self.state.lock().unwrap();
        (state.streams[index].on_event)(StreamEvent::Line(line.as_bytes().to_vec()));
    }

    pub fn emit(&self, index: usize, envelope: &Envelope) {
        self.emit_line(index, &envelope.to_line().unwrap());
    }

    /// Let the `index`th spawned stream die on its own.
    pub fn exit(&self, index: usize) {
        let state = self.state.lock().unwrap();
        let stream = &state.streams[index];
        let error = ProcessError::UnexpectedEof { command: stream.descriptor.to_string(), status: "exit status: 1".to_string() };
        (stream.on_event)(StreamEvent::Exited(error));
    }
}

impl ProcessBridge for FakeBridge {
    fn run_once(&self, descriptor: &CommandDescriptor) -> BoxFuture<'static, Result<String, ProcessError>> {
        let mut state = self.state.lock().unwrap();
        state.runs.push(descriptor.clone());
        if state.hanging.contains(descriptor) {
            return futures::future::pending().boxed();
        }
        let command = descriptor.to_string();
        let result = match state.outputs.get(descriptor) {
            Some(Ok(output)) => Ok(output.clone()),
            Some(Err(code)) => Err(ProcessError::NonZeroExit { command, code: Some(*code), stderr: String::new() }),
            None if state.unspawnable.contains(&descriptor.executable) => Err(ProcessError::SpawnFailed {
                command,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
            None => Ok(String::new()),
        };
        async move { result }.boxed()
    }

    fn spawn_stream(&self, descriptor: &CommandDescriptor, on_event: LineHandler) -> Result<StreamHandle, ProcessError> {
        let mut state = self.state.lock().unwrap();
        if state.unspawnable.contains(&descriptor.executable) {
            return Err(ProcessError::SpawnFailed {
                command: descriptor.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            });
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move { cancel.cancelled().await }
        });
        state.streams.push(FakeStream { descriptor: descriptor.clone(), on_event, cancel: cancel.clone() });
        Ok(StreamHandle::new(cancel, task))
    }
}

/// Collects every frame a subscription receives.
pub fn recorder() -> (Arc<Mutex<Vec<Envelope>>>, impl FnMut(&Envelope) + Send + 'static) {
    let frames = Arc::new(Mutex::new(Vec::new()));
    let on_frame = {
        let frames = frames.clone();
        move |envelope: &Envelope| frames.lock().unwrap().push(envelope.clone())
    };
    (frames, on_frame)
}
