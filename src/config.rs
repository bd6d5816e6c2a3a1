//! Tool configuration
//!
//! A small JSON file remembers whether commands run locally or on a remote
//! host over ssh. Every orchestrator query is wrapped through the `shell`
//! template, whose `%%cmd%%` placeholder receives the actual command.

use crate::error::{LabelError, Result};
use crate::executor::ExecutionTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Placeholder replaced by the command in the shell template
pub const CMD_PLACEHOLDER: &str = "%%cmd%%";

/// Environment override for the configuration file path
pub const CONFIG_PATH_ENV: &str = "TRAEFIK_LOCAL_CONFIG";
/// Environment override for the service cache path
pub const CACHE_PATH_ENV: &str = "TRAEFIK_LOCAL_CACHE";

const CONFIG_FILE_NAME: &str = ".traefikConfig";
const CACHE_FILE_NAME: &str = ".traefikConfigCache";

/// Persisted execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Command template containing `%%cmd%%`
    pub shell: String,
    /// Run on a remote host
    pub remote: bool,
    /// Remote host name or address
    pub server: String,
    /// Remote ssh port
    pub port: u16,
    /// Remote ssh user
    pub username: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            shell: CMD_PLACEHOLDER.to_string(),
            remote: false,
            server: String::new(),
            port: default_ssh_port(),
            username: default_ssh_username(),
        }
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_ssh_username() -> String {
    "root".to_string()
}

impl ToolConfig {
    /// Configuration that runs everything through the local shell
    pub fn local() -> Self {
        Self::default()
    }

    /// Configuration that runs everything over ssh
    pub fn remote(server: &str, username: Option<&str>, port: Option<u16>) -> Self {
        let username = username.map(str::to_string).unwrap_or_else(default_ssh_username);
        let port = port.unwrap_or_else(default_ssh_port);
        Self {
            shell: format!("ssh -p {} {}@{} '{}'", port, username, server, CMD_PLACEHOLDER),
            remote: true,
            server: server.to_string(),
            port,
            username,
        }
    }

    /// Substitute a command into the shell template
    pub fn wrap(&self, cmd: &str) -> String {
        self.shell.replacen(CMD_PLACEHOLDER, cmd, 1)
    }

    /// Where generated commands are executed
    pub fn target(&self) -> ExecutionTarget {
        if self.remote {
            ExecutionTarget::Remote {
                host: self.server.clone(),
                port: self.port,
                username: self.username.clone(),
            }
        } else {
            ExecutionTarget::Local
        }
    }

    /// Load the configuration, falling back to defaults on any failure
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(path.as_ref()) {
            Ok(Some(config)) => config,
            Ok(None) => {
                warn!("using default configuration");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load the configuration; `Ok(None)` when the file does not exist
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| LabelError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: ToolConfig =
            serde_json::from_str(&content).map_err(|e| LabelError::ConfigLoad {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !config.shell.contains(CMD_PLACEHOLDER) {
            warn!(path = %path.display(), shell = %config.shell, "shell template has no %%cmd%% placeholder");
        }

        debug!(path = %path.display(), remote = config.remote, "configuration loaded");
        Ok(Some(config))
    }

    /// Persist the configuration
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let save_err = |source| LabelError::ConfigSave {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(save_err)?;
            }
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| save_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        std::fs::write(path, content).map_err(save_err)?;

        info!(path = %path.display(), remote = self.remote, "configuration saved");
        Ok(())
    }
}

/// Resolve a per-user file path from an optional override
pub fn resolve_path(override_value: Option<String>, file_name: &str) -> PathBuf {
    match override_value.filter(|v| !v.is_empty()) {
        Some(path) => PathBuf::from(path),
        None => dirs_next::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(file_name),
    }
}

/// Path of the configuration file
pub fn config_path() -> PathBuf {
    resolve_path(std::env::var(CONFIG_PATH_ENV).ok(), CONFIG_FILE_NAME)
}

/// Path of the service cache file
pub fn cache_path() -> PathBuf {
    resolve_path(std::env::var(CACHE_PATH_ENV).ok(), CACHE_FILE_NAME)
}
