/// Failure of a command run through the [`crate::ProcessBridge`].
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    #[error("Failed to spawn `{command}`: {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}", fmt_exit_code(.code))]
    NonZeroExit { command: String, code: Option<i32>, stderr: String },

    #[error("Output of `{command}` is not valid utf-8")]
    InvalidOutput { command: String },

    #[error("Failed to read output of `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Output stream of `{command}` ended ({status})")]
    UnexpectedEof { command: String, status: String },
}

impl ProcessError {
    pub fn command(&self) -> &str {
        match self {
            ProcessError::SpawnFailed { command, .. }
            | ProcessError::NonZeroExit { command, .. }
            | ProcessError::InvalidOutput { command }
            | ProcessError::Io { command, .. }
            | ProcessError::UnexpectedEof { command, .. } => command,
        }
    }
}

fn fmt_exit_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (killed by a signal)".to_string(),
    }
}

/// A fire-and-forget command could not be delivered. Only ever logged.
#[derive(thiserror::Error, Debug)]
#[error("Failed to deliver command `{}`", .0.command())]
pub struct CommandDeliveryError(#[from] pub ProcessError);
