//! Process-wide shutdown signalling.
//! Long running tasks await [`recv_exit`] and clean up once the daemon is asked to terminate.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use tokio::sync::broadcast;

static EXIT_SENDER: Lazy<broadcast::Sender<()>> = Lazy::new(|| broadcast::channel(2).0);

/// Ask every task waiting in [`recv_exit`] to shut down.
pub fn send_exit() -> Result<()> {
    EXIT_SENDER.send(()).context("No task is listening for the exit event")?;
    Ok(())
}

/// Resolves once [`send_exit`] has been called.
pub async fn recv_exit() -> Result<()> {
    EXIT_SENDER.subscribe().recv().await.context("Failed to receive exit event")
}

/// Run `tokio::select!` in a loop until the daemon is asked to exit.
#[macro_export]
macro_rules! loop_select_exiting {
    ($($content:tt)*) => {
        loop {
            tokio::select! {
                Ok(()) = $crate::application_lifecycle::recv_exit() => {
                    break;
                }
                $($content)*
            }
        }
    };
}
