//! The external commands the bar widgets run.

use serde::{Deserialize, Serialize};
use skadi_payload::WorkspaceId;

use crate::{config::BackendConfig, descriptor::CommandDescriptor};

/// Media player controls, named as `playerctl` expects them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::AsRefStr, strum::EnumString, strum::Display, clap::ValueEnum,
)]
#[strum(serialize_all = "kebab-case")]
pub enum PlayerAction {
    Previous,
    Play,
    Pause,
    PlayPause,
    Next,
}

pub fn switch_workspace(id: WorkspaceId) -> CommandDescriptor {
    CommandDescriptor::one_shot("hyprctl", ["dispatch".to_string(), "workspace".to_string(), id.to_string()])
}

pub fn list_workspaces() -> CommandDescriptor {
    CommandDescriptor::one_shot("hyprctl", ["workspaces", "-j"])
}

pub fn active_workspace() -> CommandDescriptor {
    CommandDescriptor::one_shot("hyprctl", ["activeworkspace", "-j"])
}

pub fn media_control(player: &str, action: PlayerAction) -> CommandDescriptor {
    CommandDescriptor::one_shot("playerctl", [format!("--player={}", player), action.to_string()])
}

pub fn set_volume(volume: u8) -> CommandDescriptor {
    CommandDescriptor::one_shot("pactl", ["set-sink-volume".to_string(), "@DEFAULT_SINK@".to_string(), format!("{}%", volume)])
}

pub fn get_volume() -> CommandDescriptor {
    CommandDescriptor::one_shot("pactl", ["get-sink-volume", "@DEFAULT_SINK@"])
}

pub fn power_menu() -> CommandDescriptor {
    CommandDescriptor::one_shot("wlogout", Vec::<String>::new())
}

pub fn backend_stream(backend: &BackendConfig, sysinfo_poll_interval: u64) -> CommandDescriptor {
    let args = backend.args.iter().cloned().chain(["--sysinfo-poll-interval".to_string(), sysinfo_poll_interval.to_string()]);
    CommandDescriptor::polling(backend.executable.clone(), args)
}

/// Extract the volume from the output of `pactl get-sink-volume`, which looks like
/// `Volume: front-left: 32768 /  50% / -18.06 dB,   front-right: ...`. The first percentage wins.
pub fn parse_volume(output: &str) -> Option<u8> {
    let captures = crate::regex!(r"(\d+)%").captures(output)?;
    let percent: u64 = captures.get(1)?.as_str().parse().ok()?;
    Some(percent.min(100) as u8)
}
