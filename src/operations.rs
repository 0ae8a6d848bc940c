//! Plugin installation: relocate the bundled artifacts into the host plugin
//! directory, then ask the host to load the entry file.
//!
//! Installation is destructive: an existing destination copy is removed before
//! the staged copy is moved in, and nothing is rolled back if a later step
//! fails. The `swap` strategy narrows that window by moving the new copy next
//! to the old one before the old one is removed.

use crate::error::InstallError;
use crate::host::Host;
use crate::plugin::{ArtifactKind, ArtifactSet, PluginArtifact};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const INCOMING_SUFFIX: &str = ".incoming";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplaceStrategy {
    /// Remove the destination copy, then move the staged copy in.
    #[default]
    Replace,
    /// Move the staged copy beside the destination, remove the old copy, rename.
    Swap,
}

impl FromStr for ReplaceStrategy {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(ReplaceStrategy::Replace),
            "swap" => Ok(ReplaceStrategy::Swap),
            other => Err(crate::error::ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for ReplaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceStrategy::Replace => write!(f, "replace"),
            ReplaceStrategy::Swap => write!(f, "swap"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstallOptions {
    pub strategy: ReplaceStrategy,
    pub dir_mode: u32,
    pub plugins_subdir: String,
    /// Request the host to load the entry file after installation.
    pub load: bool,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            strategy: ReplaceStrategy::Replace,
            dir_mode: 0o755,
            plugins_subdir: "plugins".to_string(),
            load: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactOutcome {
    Moved { replaced_existing: bool },
    /// Nothing staged, but the destination already holds the artifact.
    AlreadyInstalled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactReport {
    pub name: String,
    pub kind: ArtifactKind,
    pub destination: PathBuf,
    pub previously_present: bool,
    pub outcome: ArtifactOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum LoadOutcome {
    Requested,
    Skipped,
    /// The request could not be issued; the installation itself still stands.
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub plugin_dir: PathBuf,
    pub created_plugin_dir: bool,
    pub strategy: ReplaceStrategy,
    pub artifacts: Vec<ArtifactReport>,
    pub load: LoadOutcome,
    pub installed_at: DateTime<Utc>,
}

impl InstallReport {
    pub fn entry_path(&self) -> Option<&Path> {
        self.artifacts
            .iter()
            .find(|a| a.kind == ArtifactKind::EntryFile)
            .map(|a| a.destination.as_path())
    }
}

/// Install `artifacts` from `staging` into the host plugin directory and
/// request the host to load the entry file.
pub fn install_plugin<H: Host + ?Sized>(
    host: &H,
    staging: &Path,
    artifacts: &ArtifactSet,
    options: &InstallOptions,
) -> Result<InstallReport, InstallError> {
    let plugin_dir = host.user_dir()?.join(&options.plugins_subdir);
    tracing::info!(?plugin_dir, ?staging, "installing plugin");

    let created_plugin_dir = ensure_plugin_dir(&plugin_dir, options.dir_mode)?;

    // Prior copies are informational only; a first install has none.
    let mut previously_present = Vec::new();
    for artifact in artifacts.iter() {
        let present = path_present(&artifact.path_in(&plugin_dir));
        if !present {
            tracing::info!(artifact = %artifact.name, "no previous copy in plugin directory");
        }
        previously_present.push(present);
    }

    // Either the whole set is staged, or nothing is and the whole set is
    // already installed (a rerun). Checked before anything is removed.
    let nothing_staged = check_staging(artifacts, staging, &plugin_dir)?;

    let mut reports = Vec::new();
    for (artifact, present) in artifacts.iter().zip(previously_present) {
        let outcome = if nothing_staged {
            tracing::warn!(artifact = %artifact.name, "nothing staged; keeping installed copy");
            ArtifactOutcome::AlreadyInstalled
        } else {
            place_artifact(artifact, staging, &plugin_dir, options.strategy)?
        };
        reports.push(ArtifactReport {
            name: artifact.name.clone(),
            kind: artifact.kind,
            destination: artifact.path_in(&plugin_dir),
            previously_present: present,
            outcome,
        });
    }

    let entry = artifacts.entry.path_in(&plugin_dir);
    let load = if options.load {
        match host.load_plugin(&entry) {
            Ok(()) => LoadOutcome::Requested,
            Err(e) => {
                tracing::warn!(?entry, "host load request failed: {}", e);
                LoadOutcome::Failed(e.to_string())
            }
        }
    } else {
        LoadOutcome::Skipped
    };

    tracing::info!(?plugin_dir, "plugin installed");

    Ok(InstallReport {
        plugin_dir,
        created_plugin_dir,
        strategy: options.strategy,
        artifacts: reports,
        load,
        installed_at: Utc::now(),
    })
}

/// Returns true when no artifact is staged and every artifact is already
/// installed. A partly staged set is a `MissingArtifact` error.
fn check_staging(artifacts: &ArtifactSet, staging: &Path, plugin_dir: &Path) -> Result<bool, InstallError> {
    let unstaged: Vec<&PluginArtifact> = artifacts
        .iter()
        .filter(|a| !path_present(&a.path_in(staging)))
        .collect();

    if unstaged.is_empty() {
        return Ok(false);
    }

    let all_unstaged = unstaged.len() == artifacts.iter().count();
    let missing = if all_unstaged {
        unstaged.into_iter().find(|a| !path_present(&a.path_in(plugin_dir)))
    } else {
        unstaged.into_iter().next()
    };

    match missing {
        Some(artifact) => Err(InstallError::MissingArtifact(artifact.path_in(staging))),
        None => Ok(true),
    }
}

/// Create the plugin directory with `mode` if needed. Returns true if it was created.
fn ensure_plugin_dir(dir: &Path, mode: u32) -> Result<bool, InstallError> {
    if dir.is_dir() {
        return Ok(false);
    }
    if path_present(dir) {
        return Err(InstallError::NotADirectory(dir.to_path_buf()));
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
        builder.mode(mode);
        builder
            .create(dir)
            .map_err(InstallError::io("create plugin directory", dir))?;
        // The process umask may have masked bits off.
        fs::set_permissions(dir, fs::Permissions::from_mode(mode))
            .map_err(InstallError::io("set permissions on", dir))?;
    }
    #[cfg(not(unix))]
    {
        let _ = mode;
        builder
            .create(dir)
            .map_err(InstallError::io("create plugin directory", dir))?;
    }

    tracing::info!(?dir, "created plugin directory with mode {:o}", mode);
    Ok(true)
}

fn place_artifact(
    artifact: &PluginArtifact,
    staging: &Path,
    plugin_dir: &Path,
    strategy: ReplaceStrategy,
) -> Result<ArtifactOutcome, InstallError> {
    let src = artifact.path_in(staging);
    let dst = artifact.path_in(plugin_dir);

    if src == dst {
        tracing::warn!(?dst, "staging and destination are the same for {}", artifact.name);
        return Ok(ArtifactOutcome::AlreadyInstalled);
    }

    let replaced_existing = path_present(&dst);
    match strategy {
        ReplaceStrategy::Replace => {
            if replaced_existing {
                delete_path(&dst)?;
            }
            move_path(&src, &dst)?;
        }
        ReplaceStrategy::Swap => {
            let incoming = incoming_path(&dst);
            if path_present(&incoming) {
                delete_path(&incoming)?;
            }
            move_path(&src, &incoming)?;
            if replaced_existing {
                delete_path(&dst)?;
            }
            fs::rename(&incoming, &dst).map_err(InstallError::io("rename", &incoming))?;
        }
    }

    tracing::debug!(?src, ?dst, replaced_existing, "moved artifact");
    Ok(ArtifactOutcome::Moved { replaced_existing })
}

fn incoming_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(INCOMING_SUFFIX);
    dst.with_file_name(name)
}

/// Exists, without following a trailing symlink.
fn path_present(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Move a file or directory. Falls back to copy + delete when the rename
/// crosses filesystems; any other rename error is returned as is.
fn move_path(source: &Path, dest: &Path) -> Result<(), InstallError> {
    match fs::rename(source, dest) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(?source, ?dest, "rename crosses devices, copying instead");
            copy_then_delete(source, dest)
        }
        Err(e) => Err(InstallError::io("move", source)(e)),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

/// Copy `source` (file or directory tree) to `dest`, then remove `source`.
fn copy_then_delete(source: &Path, dest: &Path) -> Result<(), InstallError> {
    if source.is_dir() {
        copy_directory_recursive(source, dest)?;
    } else {
        fs::copy(source, dest).map_err(InstallError::io("copy", source))?;
    }
    delete_path(source)
}

fn copy_directory_recursive(source: &Path, dest: &Path) -> Result<(), InstallError> {
    fs::create_dir_all(dest).map_err(InstallError::io("create directory", dest))?;

    let entries = fs::read_dir(source).map_err(InstallError::io("read directory", source))?;
    for entry in entries {
        let entry = entry.map_err(InstallError::io("read directory", source))?;
        let path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if path.is_dir() {
            copy_directory_recursive(&path, &dest_path)?;
        } else {
            fs::copy(&path, &dest_path).map_err(InstallError::io("copy", &path))?;
        }
    }

    Ok(())
}

/// Delete a file, symlink or directory tree.
fn delete_path(path: &Path) -> Result<(), InstallError> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return Ok(()),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(InstallError::io("remove directory", path))
    } else {
        fs::remove_file(path).map_err(InstallError::io("remove file", path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn incoming_path_is_a_sibling() {
        assert_eq!(
            incoming_path(Path::new("/p/plugins/pkg")),
            PathBuf::from("/p/plugins/pkg.incoming")
        );
    }

    #[test]
    fn strategy_parses_and_displays() {
        assert_eq!("swap".parse::<ReplaceStrategy>().unwrap(), ReplaceStrategy::Swap);
        assert_eq!(ReplaceStrategy::Replace.to_string(), "replace");
        assert!("copy".parse::<ReplaceStrategy>().is_err());
    }

    #[test]
    fn move_path_moves_directory_trees() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("pkg");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("nested/mod.py"), "x = 1").unwrap();

        let dst = tmp.path().join("out");
        move_path(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read_to_string(dst.join("nested/mod.py")).unwrap(), "x = 1");
    }

    #[test]
    fn copy_then_delete_moves_a_file() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("entry.py");
        let dst = tmp.path().join("out.py");
        fs::write(&src, b"# entry\n\x00\xff").unwrap();

        copy_then_delete(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"# entry\n\x00\xff");
    }

    #[test]
    fn copy_then_delete_moves_a_directory_tree() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("pkg");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/c.bin"), [0u8, 1, 2, 255]).unwrap();
        fs::write(src.join("top.py"), "top").unwrap();

        let dst = tmp.path().join("moved");
        copy_then_delete(&src, &dst).unwrap();

        assert!(!src.exists());
        assert_eq!(fs::read(dst.join("a/b/c.bin")).unwrap(), vec![0u8, 1, 2, 255]);
        assert_eq!(fs::read_to_string(dst.join("top.py")).unwrap(), "top");
    }

    #[test]
    fn only_cross_device_errors_fall_back_to_copy() {
        assert!(is_cross_device(&io::Error::from(io::ErrorKind::CrossesDevices)));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[test]
    fn failed_rename_reports_the_move() {
        let tmp = TempDir::new().unwrap();
        let err = move_path(&tmp.path().join("absent"), &tmp.path().join("dst")).unwrap_err();
        assert!(matches!(err, InstallError::Io { action: "move", .. }));
    }

    #[test]
    fn copy_fallback_preserves_contents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("pkg");
        fs::create_dir_all(src.join("a/b")).unwrap();
        fs::write(src.join("a/b/c.txt"), "deep").unwrap();
        fs::write(src.join("top.txt"), "top").unwrap();

        let dst = tmp.path().join("copy");
        copy_directory_recursive(&src, &dst).unwrap();

        assert_eq!(fs::read_to_string(dst.join("a/b/c.txt")).unwrap(), "deep");
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "top");
        assert!(src.exists());
    }

    #[test]
    fn delete_path_ignores_missing_and_handles_both_kinds() {
        let tmp = TempDir::new().unwrap();
        delete_path(&tmp.path().join("missing")).unwrap();

        let file = tmp.path().join("f");
        fs::write(&file, "").unwrap();
        delete_path(&file).unwrap();
        assert!(!file.exists());

        let dir = tmp.path().join("d");
        fs::create_dir_all(dir.join("x")).unwrap();
        delete_path(&dir).unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn plugin_dir_blocked_by_file_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("plugins");
        fs::write(&blocker, "").unwrap();
        assert!(matches!(ensure_plugin_dir(&blocker, 0o755), Err(InstallError::NotADirectory(_))));
    }
}
