//! The host application, seen only through the two operations the installer needs.

use crate::config::Config;
use crate::error::{ConfigError, HostError};
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait Host {
    /// User-level directory the host keeps its plugins under.
    fn user_dir(&self) -> Result<PathBuf, HostError>;

    /// Ask the running host to load the plugin at `path`.
    fn load_plugin(&self, path: &Path) -> Result<(), HostError>;
}

/// Host described by configuration: a user directory (optionally overridden by
/// an environment variable) and an optional load command.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredHost {
    pub user_dir: Option<PathBuf>,
    pub user_dir_env: Option<String>,
    pub load_command: Vec<String>,
}

impl ConfiguredHost {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            user_dir: config.user_dir()?,
            user_dir_env: config.host.user_dir_env.clone(),
            load_command: config.host.load_command.clone(),
        })
    }

    /// Fixed user directory, ignoring any environment override.
    pub fn with_user_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_dir = Some(dir.into());
        self.user_dir_env = None;
        self
    }

    fn command_for(&self, path: &Path) -> Result<Command, HostError> {
        let path = path.to_string_lossy();
        let mut parts = self.load_command.iter().map(|part| part.replace("{path}", &path));
        let program = parts.next().ok_or(HostError::EmptyLoadCommand)?;
        let mut command = Command::new(program);
        command.args(parts);
        Ok(command)
    }
}

impl Host for ConfiguredHost {
    fn user_dir(&self) -> Result<PathBuf, HostError> {
        let from_env = self
            .user_dir_env
            .as_deref()
            .and_then(std::env::var_os)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        from_env
            .or_else(|| self.user_dir.clone())
            .ok_or(HostError::UserDirUnknown)
    }

    fn load_plugin(&self, path: &Path) -> Result<(), HostError> {
        if self.load_command.is_empty() {
            tracing::info!(?path, "no load command configured; the host will load the plugin on its next start");
            return Ok(());
        }

        let mut command = self.command_for(path)?;
        let program = self.load_command[0].clone();
        tracing::info!(?command, "requesting host to load plugin");
        let status = command
            .status()
            .map_err(|source| HostError::Spawn { program, source })?;

        if status.success() {
            Ok(())
        } else {
            Err(HostError::LoadCommand(status))
        }
    }
}
