use anyhow::{Context, Result};

/// Response the bar sends back to a client for commands that carry a response sender.
#[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_more::Display)]
pub enum DaemonResponse {
    Success(String),
    Failure(String),
}

impl DaemonResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, DaemonResponse::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

#[derive(Debug, Clone)]
pub struct DaemonResponseSender(tokio::sync::mpsc::UnboundedSender<DaemonResponse>);

pub fn create_pair() -> (DaemonResponseSender, DaemonResponseReceiver) {
    let (sender, recv) = tokio::sync::mpsc::unbounded_channel();
    (DaemonResponseSender(sender), recv)
}

impl DaemonResponseSender {
    pub fn send_success(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Success(s)).context("Failed to send success response from bar task")
    }

    pub fn send_failure(&self, s: String) -> Result<()> {
        self.0.send(DaemonResponse::Failure(s)).context("Failed to send failure response from bar task")
    }

    /// Answer with the outcome of `result`, rendering errors with their context chain.
    pub fn respond_with_result<T: std::fmt::Display>(&self, result: Result<T>) -> Result<()> {
        match result {
            Ok(x) => self.send_success(x.to_string()),
            Err(e) => self.send_failure(format!("{:?}", e)),
        }
    }
}

pub type DaemonResponseReceiver = tokio::sync::mpsc::UnboundedReceiver<DaemonResponse>;
