//! bindshim Core Library
//!
//! GUI-binding compatibility facade and one-shot plugin installer for a
//! collaborative reverse-engineering plugin.
//!
//! # Core Features Implemented
//!
//! ## Binding Resolution (`registry` module)
//! - `resolve()` - Pick the first usable candidate binding, in priority order
//! - `initialize()` / `bindings()` - Write-once process-wide resolved table
//! - Divergent symbols are covered by per-candidate adapters (`binding` module)
//!
//! ## Symbol Sources (`source` module)
//! - `SymbolSource` - What the resolver asks "is this importable"
//! - `Inventory` - JSON/TOML description of installed binding modules
//!
//! ## Plugin Installation (`operations` module)
//! - `install_plugin()` - Move the staged entry file and package into the host
//!   plugin directory, then request the host to load the entry file
//!
//! ## Host & Configuration (`host`, `config` modules)
//! - `Host` - User directory and "load plugin from path"
//! - `Config` - Embedded defaults layered with the user's `config.toml`
//!
//! ## C ABI (`ffi` module)
//! - `bindshim_resolve_inventory()`, `bindshim_binding_name()`, `bindshim_install()`, ...

pub mod binding;
pub mod config;
pub mod error;
pub mod ffi;
pub mod host;
pub mod operations;
pub mod plugin;
pub mod registry;
pub mod source;

pub use binding::{CandidateBinding, SymbolPath, CANONICAL_SYMBOLS, SURFACE_VERSION};
pub use error::{ImportError, InstallError, ResolveError};
pub use plugin::{ArtifactKind, ArtifactSet, PluginArtifact};
pub use registry::{Resolution, ResolvedBindingTable, SymbolHandle};
