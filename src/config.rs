//! Layered configuration: embedded defaults, then the user's `config.toml`.

use crate::error::ConfigError;
use crate::operations::{InstallOptions, ReplaceStrategy};
use crate::plugin::ArtifactSet;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULTS: &str = include_str!("../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: HostConfig,
    pub plugin: PluginConfig,
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub user_dir: Option<String>,
    #[serde(default)]
    pub user_dir_env: Option<String>,
    pub plugins_subdir: String,
    pub dir_mode: String,
    #[serde(default)]
    pub load_command: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub entry_file: String,
    pub package_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallConfig {
    pub strategy: ReplaceStrategy,
}

impl Config {
    /// Embedded defaults only.
    pub fn defaults() -> Result<Self, ConfigError> {
        Ok(toml::from_str(DEFAULTS)?)
    }

    /// Defaults overlaid with the user config file, if one exists.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(user_config_path().filter(|p| p.exists()).as_deref())
    }

    /// Defaults overlaid with `path`. A named file that cannot be read is an error.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;

        if let Some(path) = path {
            let user_str = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let user: toml::Table = toml::from_str(&user_str)?;
            merge_tables(&mut merged, user);
            tracing::debug!(?path, "loaded user config");
        }

        Ok(toml::Value::Table(merged).try_into()?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut merged: toml::Table = toml::from_str(DEFAULTS)?;
        merge_tables(&mut merged, toml::from_str(s)?);
        Ok(toml::Value::Table(merged).try_into()?)
    }

    pub fn artifacts(&self) -> ArtifactSet {
        ArtifactSet::new(&self.plugin.entry_file, &self.plugin.package_dir)
    }

    /// Parse `host.dir_mode` as an octal permission string.
    pub fn dir_mode(&self) -> Result<u32, ConfigError> {
        let raw = self.host.dir_mode.trim();
        let digits = raw.strip_prefix("0o").unwrap_or(raw);
        match u32::from_str_radix(digits, 8) {
            Ok(mode) if mode <= 0o7777 => Ok(mode),
            _ => Err(ConfigError::InvalidMode(self.host.dir_mode.clone())),
        }
    }

    /// Configured host user directory with `~` expanded.
    pub fn user_dir(&self) -> Result<Option<PathBuf>, ConfigError> {
        self.host.user_dir.as_deref().map(expand_home).transpose()
    }

    pub fn install_options(&self) -> Result<InstallOptions, ConfigError> {
        Ok(InstallOptions {
            strategy: self.install.strategy,
            dir_mode: self.dir_mode()?,
            plugins_subdir: self.host.plugins_subdir.clone(),
            load: true,
        })
    }
}

/// `config.toml` in the platform config directory for bindshim.
pub fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "bindshim").map(|d| d.config_dir().join("config.toml"))
}

fn expand_home(raw: &str) -> Result<PathBuf, ConfigError> {
    match raw.strip_prefix('~') {
        Some(rest) => {
            let home = directories::BaseDirs::new()
                .map(|d| d.home_dir().to_path_buf())
                .ok_or(ConfigError::NoHome)?;
            Ok(home.join(rest.trim_start_matches(['/', '\\'])))
        }
        None => Ok(PathBuf::from(raw)),
    }
}

/// Recursively overlay `overlay` onto `base`; non-table values replace.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_defaults_parse() {
        let config = Config::defaults().unwrap();
        assert_eq!(config.host.plugins_subdir, "plugins");
        assert_eq!(config.host.user_dir_env.as_deref(), Some("IDAUSR"));
        assert_eq!(config.dir_mode().unwrap(), 0o755);
        assert_eq!(config.install.strategy, ReplaceStrategy::Replace);
        assert!(config.host.load_command.is_empty());
    }

    #[test]
    fn partial_user_config_keeps_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [install]
            strategy = "swap"

            [plugin]
            entry_file = "other_plugin.py"
            "#,
        )
        .unwrap();

        assert_eq!(config.install.strategy, ReplaceStrategy::Swap);
        assert_eq!(config.plugin.entry_file, "other_plugin.py");
        assert_eq!(config.plugin.package_dir, "idarling");
        assert_eq!(config.host.plugins_subdir, "plugins");
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        match Config::load_from(Some(path.as_path())) {
            Err(ConfigError::Read { path: reported, source }) => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn load_from_nothing_yields_defaults() {
        let config = Config::load_from(None).unwrap();
        assert_eq!(config.plugin.package_dir, "idarling");
    }

    #[test]
    fn load_from_file_overrides() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[host]\nuser_dir = \"/opt/host\"\nload_command = [\"host\", \"-S{path}\"]\n").unwrap();

        let config = Config::load_from(Some(path.as_path())).unwrap();
        assert_eq!(config.user_dir().unwrap(), Some(PathBuf::from("/opt/host")));
        assert_eq!(config.host.load_command, vec!["host", "-S{path}"]);
        assert_eq!(config.host.dir_mode, "0755");
    }

    #[test]
    fn bad_values_are_rejected() {
        let config = Config::from_toml_str("[host]\ndir_mode = \"rwx\"\n").unwrap();
        assert!(matches!(config.dir_mode(), Err(ConfigError::InvalidMode(_))));
        assert!(Config::from_toml_str("[install]\nstrategy = \"copy\"\n").is_err());
    }

    #[test]
    fn octal_prefix_is_accepted() {
        let config = Config::from_toml_str("[host]\ndir_mode = \"0o700\"\n").unwrap();
        assert_eq!(config.dir_mode().unwrap(), 0o700);
    }
}
