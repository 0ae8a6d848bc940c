//! Binding resolution: selects the GUI binding the rest of the plugin uses.
//!
//! Candidates are tried strictly in priority order. A candidate is selected
//! when every required symbol resolves through its primary path or one of its
//! divergence adapters; resolution stops at the first such candidate.
//!
//! # Process-wide table
//!
//! [`initialize`] runs resolution once and stores the outcome in a write-once
//! cell. Later calls, successful or not, return the stored outcome; [`bindings`]
//! gives read access afterwards.
//!
//! ```no_run
//! use bindshim_core::registry;
//! use bindshim_core::source::Inventory;
//!
//! let inventory = Inventory::load("bindings.toml".as_ref())?;
//! let table = registry::initialize(&inventory)?;
//! println!("{} (epoch {})", table.binding(), table.epoch());
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::binding::{builtin_candidates, CandidateBinding, Requirement, SymbolPath, SURFACE_VERSION};
use crate::error::{CandidateRejection, ImportError, ResolveError};
use crate::source::SymbolSource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Where a canonical symbol was actually found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolHandle {
    pub path: SymbolPath,
    /// True when a divergence adapter supplied the symbol instead of the primary path.
    pub adapted: bool,
}

/// Canonical name → handle, plus the selected binding and its capability epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBindingTable {
    binding: String,
    epoch: u32,
    surface_version: u32,
    symbols: BTreeMap<String, SymbolHandle>,
    optional: BTreeMap<String, Option<SymbolHandle>>,
}

impl ResolvedBindingTable {
    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    pub fn surface_version(&self) -> u32 {
        self.surface_version
    }

    pub fn get(&self, canonical: &str) -> Option<&SymbolHandle> {
        self.symbols.get(canonical)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }

    pub fn symbols(&self) -> &BTreeMap<String, SymbolHandle> {
        &self.symbols
    }

    /// Handle of an optional symbol, `None` when it was absent or is not optional.
    pub fn optional(&self, canonical: &str) -> Option<&SymbolHandle> {
        self.optional.get(canonical).and_then(Option::as_ref)
    }

    pub fn has_optional(&self, canonical: &str) -> bool {
        self.optional(canonical).is_some()
    }

    pub fn optional_names(&self) -> impl Iterator<Item = &str> {
        self.optional.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { index: usize, table: ResolvedBindingTable },
    Failed { rejections: Vec<CandidateRejection> },
}

impl Resolution {
    pub fn into_result(self) -> Result<ResolvedBindingTable, ResolveError> {
        match self {
            Resolution::Resolved { table, .. } => Ok(table),
            Resolution::Failed { rejections } => Err(ResolveError::NoBindingAvailable { rejections }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverState {
    Unresolved,
    Trying(usize),
    Resolved(usize),
    Failed,
}

impl ResolverState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolverState::Resolved(_) | ResolverState::Failed)
    }
}

/// Step-wise resolution over an ordered candidate list.
pub struct Resolver<'a, S: ?Sized> {
    candidates: &'a [CandidateBinding],
    source: &'a S,
    state: ResolverState,
    rejections: Vec<CandidateRejection>,
    table: Option<ResolvedBindingTable>,
}

impl<'a, S: SymbolSource + ?Sized> Resolver<'a, S> {
    pub fn new(candidates: &'a [CandidateBinding], source: &'a S) -> Self {
        Self {
            candidates,
            source,
            state: ResolverState::Unresolved,
            rejections: Vec::new(),
            table: None,
        }
    }

    pub fn state(&self) -> ResolverState {
        self.state
    }

    /// Perform one transition. Terminal states do not change.
    pub fn advance(&mut self) -> ResolverState {
        self.state = match self.state {
            ResolverState::Unresolved if self.candidates.is_empty() => ResolverState::Failed,
            ResolverState::Unresolved => ResolverState::Trying(0),
            ResolverState::Trying(i) => {
                let candidate = &self.candidates[i];
                match attempt_candidate(candidate, self.source) {
                    Ok(table) => {
                        tracing::debug!(candidate = %candidate.name, epoch = candidate.epoch, "binding selected");
                        self.table = Some(table);
                        ResolverState::Resolved(i)
                    }
                    Err(rejection) => {
                        tracing::debug!(%rejection, "candidate rejected");
                        self.rejections.push(rejection);
                        if i + 1 < self.candidates.len() {
                            ResolverState::Trying(i + 1)
                        } else {
                            ResolverState::Failed
                        }
                    }
                }
            }
            terminal => terminal,
        };
        self.state
    }

    /// Advance until a terminal state is reached.
    pub fn run(mut self) -> Resolution {
        while !self.state.is_terminal() {
            self.advance();
        }
        match (self.state, self.table) {
            (ResolverState::Resolved(index), Some(table)) => Resolution::Resolved { index, table },
            _ => Resolution::Failed { rejections: self.rejections },
        }
    }
}

/// Resolve `candidates` against `source` in priority order.
pub fn resolve<S: SymbolSource + ?Sized>(candidates: &[CandidateBinding], source: &S) -> Resolution {
    Resolver::new(candidates, source).run()
}

fn attempt_candidate<S: SymbolSource + ?Sized>(
    candidate: &CandidateBinding,
    source: &S,
) -> Result<ResolvedBindingTable, CandidateRejection> {
    let mut symbols = BTreeMap::new();
    for req in &candidate.required {
        let handle = resolve_requirement(req, source).map_err(|cause| CandidateRejection {
            candidate: candidate.name.clone(),
            symbol: req.canonical.clone(),
            cause,
        })?;
        symbols.insert(req.canonical.clone(), handle);
    }

    let optional = candidate
        .optional
        .iter()
        .map(|req| (req.canonical.clone(), resolve_requirement(req, source).ok()))
        .collect();

    Ok(ResolvedBindingTable {
        binding: candidate.name.clone(),
        epoch: candidate.epoch,
        surface_version: SURFACE_VERSION,
        symbols,
        optional,
    })
}

/// Try the primary path, then each adapter. On failure report the primary path's error.
fn resolve_requirement<S: SymbolSource + ?Sized>(
    req: &Requirement,
    source: &S,
) -> Result<SymbolHandle, ImportError> {
    let mut first_error = None;
    for (i, path) in req.alternatives().enumerate() {
        match source.import(path) {
            Ok(()) => {
                return Ok(SymbolHandle { path: path.clone(), adapted: i > 0 });
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| ImportError::ModuleNotFound(req.primary.module.clone())))
}

static BINDINGS: OnceLock<Result<ResolvedBindingTable, ResolveError>> = OnceLock::new();

/// Resolve the built-in candidates once for the whole process.
pub fn initialize<S: SymbolSource + ?Sized>(source: &S) -> Result<&'static ResolvedBindingTable, ResolveError> {
    initialize_with(&builtin_candidates(), source)
}

/// Like [`initialize`] with an explicit candidate list. Only the first call
/// in a process resolves; its outcome is returned to every later caller.
pub fn initialize_with<S: SymbolSource + ?Sized>(
    candidates: &[CandidateBinding],
    source: &S,
) -> Result<&'static ResolvedBindingTable, ResolveError> {
    BINDINGS
        .get_or_init(|| {
            let outcome = resolve(candidates, source).into_result();
            match &outcome {
                Ok(table) => tracing::info!(binding = table.binding(), epoch = table.epoch(), "GUI binding resolved"),
                Err(e) => tracing::error!("{}", e),
            }
            outcome
        })
        .as_ref()
        .map_err(Clone::clone)
}

/// The process-wide table, if initialization ran and succeeded.
pub fn bindings() -> Option<&'static ResolvedBindingTable> {
    BINDINGS.get().and_then(|outcome| outcome.as_ref().ok())
}

/// The settled process-wide outcome, or `None` before the first
/// [`initialize`] call.
pub fn outcome() -> Option<Result<&'static ResolvedBindingTable, &'static ResolveError>> {
    BINDINGS.get().map(|outcome| outcome.as_ref())
}
