use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::mpsc::UnboundedSender,
};

use crate::{app::BarCommand, opts};

/// How long a connection waits for the bar to answer before it is closed without a response.
const RESPONSE_TIMEOUT: Duration = Duration::from_millis(100);

pub async fn run_server<P: AsRef<std::path::Path>>(evt_send: UnboundedSender<BarCommand>, socket_path: P) -> Result<()> {
    let socket_path = socket_path.as_ref();
    let listener = tokio::net::UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind IPC socket at {}", socket_path.display()))?;
    log::info!("IPC server initialized");
    crate::loop_select_exiting! {
        connection = listener.accept() => match connection {
            Ok((stream, _addr)) => {
                let evt_send = evt_send.clone();
                tokio::spawn(async move {
                    let result = handle_connection(stream, evt_send).await;
                    crate::print_result_err!("while handling IPC connection with client", result);
                });
            },
            Err(e) => log::error!("Failed to connect to client: {:?}", e),
        }
    }
    Ok(())
}

/// Handle a single IPC connection from start to end.
async fn handle_connection(mut stream: tokio::net::UnixStream, evt_send: UnboundedSender<BarCommand>) -> Result<()> {
    let (mut stream_read, mut stream_write) = stream.split();

    let action: opts::ActionWithServer = read_action_from_stream(&mut stream_read).await?;

    log::debug!("received command from IPC: {:?}", &action);

    let (command, maybe_response_recv) = action.into_daemon_command();

    evt_send.send(command).context("The bar is no longer running")?;

    if let Some(mut response_recv) = maybe_response_recv {
        log::debug!("Waiting for response for IPC client");
        if let Ok(Some(response)) = tokio::time::timeout(RESPONSE_TIMEOUT, response_recv.recv()).await {
            let response = bincode::serialize(&response)?;
            let result = &stream_write.write_all(&response).await;
            crate::print_result_err!("sending text response to ipc client", &result);
        }
    }
    stream_write.shutdown().await?;
    Ok(())
}

/// Read a single message from a unix stream, and parse it into an `ActionWithServer`.
/// The first 4 bytes are the length of the rest of the message, in big-endian.
async fn read_action_from_stream(stream_read: &'_ mut tokio::net::unix::ReadHalf<'_>) -> Result<opts::ActionWithServer> {
    let mut message_byte_length = [0u8; 4];
    stream_read.read_exact(&mut message_byte_length).await.context("Failed to read message size header in IPC message")?;
    let message_byte_length = u32::from_be_bytes(message_byte_length) as usize;
    let mut raw_message = vec![0u8; message_byte_length];
    stream_read.read_exact(&mut raw_message).await.context("Failed to read actual IPC message")?;

    bincode::deserialize(&raw_message).context("Failed to parse client message")
}
