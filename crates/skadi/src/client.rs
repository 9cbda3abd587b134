use std::{
    io::{Read, Write},
    os::unix::net::UnixStream,
    path::Path,
    time::Duration,
};

use anyhow::{Context, Result};

use crate::{daemon_response::DaemonResponse, opts::ActionWithServer, paths::SkadiPaths};

/// Connect to the daemon and send the given request.
/// Returns the response from the daemon, or None if the daemon did not provide any useful response.
/// An Ok(None) response does _not_ indicate failure.
pub fn do_server_call(stream: &mut UnixStream, action: &ActionWithServer) -> Result<Option<DaemonResponse>> {
    log::debug!("Forwarding options to server");
    stream.set_nonblocking(false).context("Failed to set stream to blocking")?;

    let message_bytes = bincode::serialize(&action)?;

    stream.write_all(&(message_bytes.len() as u32).to_be_bytes()).context("Failed to send command size header to IPC stream")?;
    stream.write_all(&message_bytes).context("Failed to write command to IPC stream")?;

    let mut buf = Vec::new();
    stream.set_read_timeout(Some(Duration::from_millis(100))).context("Failed to set read timeout")?;
    stream.read_to_end(&mut buf).context("Error reading response from server")?;

    Ok(if buf.is_empty() { None } else { Some(bincode::deserialize(&buf)?) })
}

/// Send `action` to a running daemon, trying to connect up to `connect_attempts` times.
pub fn handle_server_command(paths: &SkadiPaths, action: &ActionWithServer, connect_attempts: usize) -> Result<Option<DaemonResponse>> {
    log::debug!("Trying to find server process at socket {}", paths.get_ipc_socket_file().display());
    let mut stream = attempt_connect(paths.get_ipc_socket_file(), connect_attempts).context("Failed to connect to daemon")?;
    log::debug!("Connected to skadi server ({}).", &paths.get_ipc_socket_file().display());
    do_server_call(&mut stream, action).context("Error while forwarding command to server")
}

pub fn attempt_connect(socket_path: impl AsRef<Path>, attempts: usize) -> Option<UnixStream> {
    for _ in 0..attempts {
        if let Ok(mut con) = UnixStream::connect(&socket_path) {
            if do_server_call(&mut con, &ActionWithServer::Ping).is_ok() {
                return UnixStream::connect(&socket_path).ok();
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    None
}

/// Check if a skadi server is currently running by trying to send a ping message to it.
pub fn check_server_running(socket_path: impl AsRef<Path>) -> bool {
    let response = UnixStream::connect(socket_path).ok().and_then(|mut stream| do_server_call(&mut stream, &ActionWithServer::Ping).ok());
    response.is_some()
}
