use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::config::CONFIG_FILE_NAME;

/// Stores references to all the paths relevant to skadi
#[derive(Debug, Clone)]
pub struct SkadiPaths {
    pub config_dir: PathBuf,
    pub ipc_socket_file: PathBuf,
}

impl SkadiPaths {
    /// The config dir does not need to exist; the socket name is derived from its path either way.
    pub fn from_config_dir<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref();
        if config_dir.is_file() {
            bail!("Please provide the path to the config directory, not a file within it")
        }
        let config_dir = if config_dir.exists() { config_dir.canonicalize()? } else { config_dir.to_path_buf() };

        let mut hasher = DefaultHasher::new();
        format!("{}", config_dir.display()).hash(&mut hasher);
        // keeps the socket path below the 108 byte limit of unix sockets
        let daemon_id = format!("{:x}", hasher.finish());

        let ipc_socket_file = std::env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
            .join(format!("skadi-server_{}", daemon_id));

        if format!("{}", ipc_socket_file.display()).len() > 100 {
            log::warn!("The IPC socket file's absolute path exceeds 100 bytes, the socket may fail to create.");
        }

        Ok(SkadiPaths { config_dir, ipc_socket_file })
    }

    pub fn default() -> Result<Self> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => PathBuf::from(std::env::var("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?).join(".config"),
        }
        .join("skadi");

        Self::from_config_dir(config_dir)
    }

    pub fn get_ipc_socket_file(&self) -> &Path {
        self.ipc_socket_file.as_path()
    }

    pub fn get_config_dir(&self) -> &Path {
        self.config_dir.as_path()
    }

    pub fn get_config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }
}

impl std::fmt::Display for SkadiPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config-dir: {}, ipc-socket: {}", self.config_dir.display(), self.ipc_socket_file.display())
    }
}
