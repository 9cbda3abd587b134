use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use skadi_payload::WorkspaceId;

use crate::{
    app::BarCommand,
    commands::PlayerAction,
    daemon_response::{self, DaemonResponse, DaemonResponseReceiver},
};

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Opt {
    pub log_debug: bool,
    pub config_path: Option<std::path::PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, Serialize, Deserialize, PartialEq)]
#[command(name = "skadi", version, about = "A status bar driven by a streaming backend")]
struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Override path to the configuration directory (the directory that contains skadi.json)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq)]
pub enum Action {
    /// Start the skadi daemon in the foreground.
    #[command(name = "daemon", alias = "d")]
    Daemon,

    #[command(flatten)]
    WithServer(ActionWithServer),
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq)]
pub enum ActionWithServer {
    /// Ping the skadi server, checking if it is reachable.
    #[command(name = "ping")]
    Ping,

    /// Print the current state of all widgets as json
    #[command(name = "state")]
    ShowState,

    /// Set the output volume, in percent
    #[command(name = "volume", alias = "v")]
    SetVolume {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: u8,
    },

    /// Switch to the given workspace
    #[command(name = "workspace", alias = "w")]
    SwitchWorkspace {
        #[arg(value_parser = parse_workspace_id)]
        id: WorkspaceId,
    },

    /// Control the media player
    #[command(name = "media", alias = "m")]
    Media {
        #[arg(value_enum)]
        action: PlayerAction,
    },

    /// Open the power menu
    #[command(name = "power")]
    PowerMenu,

    /// Kill the skadi daemon
    #[command(name = "kill", alias = "k")]
    KillServer,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { action, log_debug, config } = other;
        Opt { action, log_debug, config_path: config }
    }
}

fn parse_workspace_id(s: &str) -> Result<WorkspaceId, String> {
    let raw: i64 = s.parse().map_err(|e| format!("{}", e))?;
    WorkspaceId::from_raw(raw).ok_or_else(|| format!("workspace ids must be positive, but got {}", raw))
}

impl ActionWithServer {
    pub fn into_daemon_command(self) -> (BarCommand, Option<DaemonResponseReceiver>) {
        let command = match self {
            ActionWithServer::Ping => {
                let (send, recv) = tokio::sync::mpsc::unbounded_channel();
                let _ = send.send(DaemonResponse::Success("pong".to_owned()));
                return (BarCommand::NoOp, Some(recv));
            }
            ActionWithServer::ShowState => {
                let (sender, recv) = daemon_response::create_pair();
                return (BarCommand::PrintState(sender), Some(recv));
            }
            ActionWithServer::SetVolume { volume } => BarCommand::SetVolume(volume),
            ActionWithServer::SwitchWorkspace { id } => BarCommand::SwitchWorkspace(id),
            ActionWithServer::Media { action } => BarCommand::Media(action),
            ActionWithServer::PowerMenu => BarCommand::PowerMenu,
            ActionWithServer::KillServer => BarCommand::KillServer,
        };
        (command, None)
    }
}
