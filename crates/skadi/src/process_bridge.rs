//! Spawning external commands, either to completion or as a continuous line stream.

use std::{future::Future, process::Stdio, time::Duration};

use futures::{future::BoxFuture, FutureExt};
use nix::{
    sys::signal,
    unistd::{setpgid, Pid},
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{descriptor::CommandDescriptor, error::ProcessError, util::trim_carriage_return};

/// Time a stream process gets to exit after SIGTERM before it is killed.
const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Something that happened on a running stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A complete line of standard output, without the line terminator.
    Line(Vec<u8>),
    /// The process ended on its own. Streams are expected to run until torn down, so this is always an error.
    Exited(ProcessError),
}

/// Receives every [`StreamEvent`] of a stream, in order. Must not block.
pub type LineHandler = Box<dyn Fn(StreamEvent) + Send + Sync>;

/// Abstraction over running external commands.
pub trait ProcessBridge: Send + Sync + 'static {
    /// Spawn the command, wait for it to exit and return its standard output.
    fn run_once(&self, descriptor: &CommandDescriptor) -> BoxFuture<'static, Result<String, ProcessError>>;

    /// Spawn the command and deliver each output line to `on_event` until the returned handle is shut down or dropped.
    fn spawn_stream(&self, descriptor: &CommandDescriptor, on_event: LineHandler) -> Result<StreamHandle, ProcessError>;
}

/// Owner of a running stream. The process is terminated when this is shut down or dropped.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new(cancel: CancellationToken, task: JoinHandle<()>) -> Self {
        Self { cancel, task: Some(task) }
    }

    /// Request termination immediately; the returned future resolves once the process has been reaped.
    pub fn shutdown(mut self) -> impl Future<Output = ()> {
        self.cancel.cancel();
        let task = self.task.take();
        async move {
            if let Some(task) = task {
                let _ = task.await;
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// [`ProcessBridge`] running real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessBridge;

impl ProcessBridge for SystemProcessBridge {
    fn run_once(&self, descriptor: &CommandDescriptor) -> BoxFuture<'static, Result<String, ProcessError>> {
        let descriptor = descriptor.clone();
        async move {
            let command = descriptor.to_string();
            log::debug!("Running command: {}", command);
            let output = tokio::process::Command::new(&descriptor.executable)
                .args(&descriptor.args)
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .output()
                .await
                .map_err(|source| ProcessError::SpawnFailed { command: command.clone(), source })?;

            if !output.status.success() {
                return Err(ProcessError::NonZeroExit {
                    command,
                    code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            String::from_utf8(output.stdout).map_err(|_| ProcessError::InvalidOutput { command })
        }
        .boxed()
    }

    fn spawn_stream(&self, descriptor: &CommandDescriptor, on_event: LineHandler) -> Result<StreamHandle, ProcessError> {
        let command = descriptor.to_string();
        log::debug!("Starting stream: {}", command);

        let mut child = unsafe {
            tokio::process::Command::new(&descriptor.executable)
                .args(&descriptor.args)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .pre_exec(|| {
                    // own process group, so that termination also reaches the stream's children
                    let _ = setpgid(Pid::from_raw(0), Pid::from_raw(0));
                    Ok(())
                })
                .spawn()
        }
        .map_err(|source| ProcessError::SpawnFailed { command: command.clone(), source })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(ProcessError::SpawnFailed {
                command,
                source: std::io::Error::new(std::io::ErrorKind::Other, "standard output was not captured"),
            });
        };

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut stdout_lines = BufReader::new(stdout).split(b'\n');
                let mut stderr_lines = BufReader::new(stderr).lines();
                let mut stderr_open = true;

                // `None` once the stream is cancelled
                let read_result = loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break None,
                        line = stdout_lines.next_segment() => match line {
                            Ok(Some(line)) => on_event(StreamEvent::Line(trim_carriage_return(line))),
                            Ok(None) => break Some(Ok(())),
                            Err(err) => break Some(Err(err)),
                        },
                        line = stderr_lines.next_line(), if stderr_open => match line {
                            Ok(Some(line)) => log::warn!("stderr of `{}`: {}", command, line),
                            _ => stderr_open = false,
                        },
                    }
                };
                match read_result {
                    None => {
                        terminate_handle(child).await;
                        return;
                    }
                    Some(Err(source)) => {
                        terminate_handle(child).await;
                        on_event(StreamEvent::Exited(ProcessError::Io { command, source }));
                        return;
                    }
                    Some(Ok(())) => {}
                }

                // standard output is gone, but the process may still be running
                let status = tokio::select! {
                    _ = cancel.cancelled() => None,
                    status = child.wait() => Some(status),
                };
                let Some(status) = status else {
                    terminate_handle(child).await;
                    return;
                };

                let status = match status {
                    Ok(status) => status.to_string(),
                    Err(err) => format!("failed to wait for process: {}", err),
                };
                let error = ProcessError::UnexpectedEof { command, status };
                on_event(StreamEvent::Exited(error));
            }
        });

        Ok(StreamHandle::new(cancel, task))
    }
}

/// Terminate the process group of a stream, escalating to SIGKILL if it does not exit in time.
async fn terminate_handle(mut child: tokio::process::Child) {
    if let Some(id) = child.id() {
        log::debug!("Killing process group {}", id);
        let _ = signal::killpg(Pid::from_raw(id as i32), signal::SIGTERM);
        tokio::select! {
            _ = child.wait() => {},
            _ = tokio::time::sleep(TERMINATE_GRACE_PERIOD) => {
                let _ = child.kill().await;
            }
        }
    } else {
        let _ = child.kill().await;
    }
}
