//! Error types shared by the resolver, the installer and configuration loading.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to import a single (module, export) pair from a symbol source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("no module named '{0}'")]
    ModuleNotFound(String),

    #[error("cannot import name '{name}' from '{module}'")]
    NameNotFound { module: String, name: String },
}

/// Why a single candidate binding was passed over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{candidate}: required symbol '{symbol}' unavailable ({cause})")]
pub struct CandidateRejection {
    pub candidate: String,
    pub symbol: String,
    pub cause: ImportError,
}

/// Resolution outcome surfaced to callers. Individual candidate failures never
/// escape on their own; they are carried inside `NoBindingAvailable`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no GUI binding available (tried {} candidate(s))", .rejections.len())]
    NoBindingAvailable { rejections: Vec<CandidateRejection> },
}

impl ResolveError {
    pub fn rejections(&self) -> &[CandidateRejection] {
        match self {
            ResolveError::NoBindingAvailable { rejections } => rejections,
        }
    }
}

/// A candidate whose declared symbols do not match the canonical surface.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "candidate {candidate} does not cover the canonical surface \
     (missing: {missing:?}, extra: {extra:?}, unattached adapters: {unattached_adapters:?})"
)]
pub struct SurfaceMismatch {
    pub candidate: String,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub unattached_adapters: Vec<String>,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("cannot determine the host user directory")]
    UserDirUnknown,

    #[error("host load command is empty")]
    EmptyLoadCommand,

    #[error("failed to launch host load command '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("host load command exited with {0}")]
    LoadCommand(std::process::ExitStatus),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error("staged artifact not found: {0:?}")]
    MissingArtifact(PathBuf),

    #[error("{0:?} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("failed to {action} {path:?}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl InstallError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| InstallError::Io { action, path, source }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config")]
    Parse(#[from] toml::de::Error),

    #[error("invalid directory mode '{0}', expected an octal string such as \"0755\"")]
    InvalidMode(String),

    #[error("unknown install strategy '{0}', expected \"replace\" or \"swap\"")]
    UnknownStrategy(String),

    #[error("cannot determine home directory")]
    NoHome,
}
