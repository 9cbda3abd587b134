use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

pub const CONFIG_FILE_NAME: &str = "skadi.json";

/// The program that emits the frame stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct BackendConfig {
    #[default(_code = "\"skadi-backend\".to_string()")]
    pub executable: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault)]
#[serde(default)]
pub struct SkadiConfig {
    pub backend: BackendConfig,
    /// seconds between two sysinfo frames
    #[default = 2]
    pub sysinfo_poll_interval: u64,
    /// player name passed to `playerctl --player=`
    #[default(_code = "\"spotify\".to_string()")]
    pub player: String,
    #[default = 200]
    pub volume_debounce_ms: u64,
    #[default = 200]
    pub volume_throttle_ms: u64,
    #[default = 30]
    pub network_history_len: usize,
}

impl SkadiConfig {
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate().with_context(|| format!("Invalid config in {}", path.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.network_history_len > 0, "network_history_len must be at least 1");
        Ok(())
    }

    /// Load the config from `config_dir`. A missing file yields the defaults, a broken one is logged and yields the defaults.
    pub fn load(config_dir: &Path) -> Self {
        let path = config_dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::read_from_file(&path) {
            Ok(config) => config,
            Err(err) => {
                log::error!("{:?}", err);
                Self::default()
            }
        }
    }

    pub fn volume_debounce(&self) -> Duration {
        Duration::from_millis(self.volume_debounce_ms)
    }

    pub fn volume_throttle(&self) -> Duration {
        Duration::from_millis(self.volume_throttle_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = SkadiConfig::default();
        assert_eq!(config.sysinfo_poll_interval, 2);
        assert_eq!(config.player, "spotify");
        assert_eq!(config.volume_debounce(), Duration::from_millis(200));
        assert_eq!(config.network_history_len, 30);
        assert_eq!(config.backend.executable, "skadi-backend");
    }

    #[test]
    fn test_partial_config() {
        let config: SkadiConfig =
            serde_json::from_str(r#"{"player": "mpv", "backend": {"executable": "/opt/skadi/backend"}}"#).unwrap();
        assert_eq!(config.player, "mpv");
        assert_eq!(config.backend, BackendConfig { executable: "/opt/skadi/backend".to_string(), args: Vec::new() });
        assert_eq!(config.volume_throttle_ms, 200);
    }

    #[test]
    fn test_broken_file_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join(format!("skadi-config-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), "{ not json").unwrap();
        assert!(SkadiConfig::read_from_file(&dir.join(CONFIG_FILE_NAME)).is_err());
        assert_eq!(SkadiConfig::load(&dir), SkadiConfig::default());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_network_history_is_rejected() {
        let dir = std::env::temp_dir().join(format!("skadi-config-history-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(CONFIG_FILE_NAME), r#"{"network_history_len": 0, "player": "mpv"}"#).unwrap();
        assert!(SkadiConfig::read_from_file(&dir.join(CONFIG_FILE_NAME)).is_err());
        assert_eq!(SkadiConfig::load(&dir).network_history_len, 30);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
