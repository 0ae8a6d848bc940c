use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    EntryFile,
    PackageDir,
}

/// One installable piece of the plugin, identified by its file or directory name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginArtifact {
    pub name: String,
    pub kind: ArtifactKind,
}

impl PluginArtifact {
    pub fn entry(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ArtifactKind::EntryFile }
    }

    pub fn package(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: ArtifactKind::PackageDir }
    }

    /// Location of this artifact inside `dir` (staging or destination).
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(&self.name)
    }
}

/// The entry file and package directory that together make up the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSet {
    pub entry: PluginArtifact,
    pub package: PluginArtifact,
}

impl ArtifactSet {
    pub fn new(entry_file: impl Into<String>, package_dir: impl Into<String>) -> Self {
        Self {
            entry: PluginArtifact::entry(entry_file),
            package: PluginArtifact::package(package_dir),
        }
    }

    /// Artifacts in installation order: entry file first, then the package.
    pub fn iter(&self) -> impl Iterator<Item = &PluginArtifact> {
        [&self.entry, &self.package].into_iter()
    }
}
