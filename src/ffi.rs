//! FFI (Foreign Function Interface) bindings for loading the facade from the host process.
//!
//! # Memory Management
//!
//! - Strings returned to the caller are allocated by Rust
//! - The caller MUST release them with `bindshim_free_string`
//! - Strings are null-terminated UTF-8
//!
//! # Usage from C
//!
//! ```c
//! int epoch = bindshim_resolve_inventory("/path/to/bindings.json");
//! if (epoch < 0) { /* no GUI binding available */ }
//!
//! char *name = bindshim_binding_name();
//! char *signal = bindshim_symbol_source("Signal");
//! bindshim_free_string(signal);
//! bindshim_free_string(name);
//! ```

use crate::config::Config;
use crate::host::ConfiguredHost;
use crate::operations::install_plugin;
use crate::registry;
use crate::source::Inventory;
use anyhow::{Context, Result};
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::{Path, PathBuf};
use std::ptr;

/// Result code for operations
#[repr(C)]
pub enum CResultCode {
    Success = 0,
    Error = 1,
}

// ============================================================================
// Binding Resolution
// ============================================================================

/// Resolve the built-in candidates against the inventory file at `path`.
/// Returns the capability epoch, or -1 when no binding is available.
/// Only the first call in a process resolves; later calls report its outcome.
#[no_mangle]
pub extern "C" fn bindshim_resolve_inventory(path: *const c_char) -> c_int {
    let Some(path) = c_char_to_str(path) else {
        return -1;
    };

    // Once decided, later calls report the stored outcome without reading anything.
    if let Some(settled) = registry::outcome() {
        return settled.map_or(-1, |table| table.epoch() as c_int);
    }

    let inventory = match Inventory::load(Path::new(path)) {
        Ok(inventory) => inventory,
        Err(e) => {
            tracing::error!("Error loading inventory: {:#}", e);
            return -1;
        }
    };

    match registry::initialize(&inventory) {
        Ok(table) => table.epoch() as c_int,
        Err(e) => {
            tracing::error!("{}", e);
            -1
        }
    }
}

/// Capability epoch of the resolved binding, or -1 if unresolved.
#[no_mangle]
pub extern "C" fn bindshim_binding_epoch() -> c_int {
    registry::bindings().map_or(-1, |table| table.epoch() as c_int)
}

/// Name of the resolved binding, or null if unresolved.
/// Caller MUST call bindshim_free_string() when done.
#[no_mangle]
pub extern "C" fn bindshim_binding_name() -> *mut c_char {
    match registry::bindings() {
        Some(table) => string_to_c_char(table.binding()),
        None => ptr::null_mut(),
    }
}

/// Import path (`module.export`) backing a canonical symbol, or null.
/// Caller MUST call bindshim_free_string() when done.
#[no_mangle]
pub extern "C" fn bindshim_symbol_source(canonical: *const c_char) -> *mut c_char {
    let Some(canonical) = c_char_to_str(canonical) else {
        return ptr::null_mut();
    };

    registry::bindings()
        .and_then(|table| table.get(canonical).or_else(|| table.optional(canonical)))
        .map_or(ptr::null_mut(), |handle| string_to_c_char(&handle.path.to_string()))
}

// ============================================================================
// Installation
// ============================================================================

/// Install the configured plugin artifacts from `staging`.
/// `user_dir` overrides the host user directory when non-null.
/// Returns 0 on success, 1 on error.
#[no_mangle]
pub extern "C" fn bindshim_install(staging: *const c_char, user_dir: *const c_char) -> c_int {
    let Some(staging) = c_char_to_str(staging) else {
        return CResultCode::Error as c_int;
    };
    let user_dir = c_char_to_str(user_dir).map(PathBuf::from);

    match install_with_config(Path::new(staging), user_dir) {
        Ok(()) => CResultCode::Success as c_int,
        Err(e) => {
            tracing::error!("Error installing plugin: {:#}", e);
            CResultCode::Error as c_int
        }
    }
}

fn install_with_config(staging: &Path, user_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let mut host = ConfiguredHost::from_config(&config)?;
    if let Some(dir) = user_dir {
        host = host.with_user_dir(dir);
    }
    let options = config.install_options()?;

    install_plugin(&host, staging, &config.artifacts(), &options)?;
    Ok(())
}

// ============================================================================
// String Management
// ============================================================================

/// Free a string returned by FFI functions.
#[no_mangle]
pub extern "C" fn bindshim_free_string(s: *mut c_char) {
    free_c_char(s);
}

// ============================================================================
// Helper Functions
// ============================================================================

fn c_char_to_str<'a>(s: *const c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(s).to_str().ok() }
}

fn string_to_c_char(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(c_str) => c_str.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn free_c_char(s: *mut c_char) {
    if !s.is_null() {
        unsafe {
            let _ = CString::from_raw(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::builtin_candidates;
    use std::fs;

    fn take_string(s: *mut c_char) -> Option<String> {
        if s.is_null() {
            return None;
        }
        let owned = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
        bindshim_free_string(s);
        Some(owned)
    }

    // The only test in this crate's unit tests that touches the process-wide table.
    #[test]
    fn resolve_through_c_abi() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bindings.json");
        let inventory = Inventory::satisfying(&builtin_candidates()[3]);
        fs::write(&path, serde_json::to_string(&inventory).unwrap()).unwrap();
        let c_path = CString::new(path.to_string_lossy().as_bytes()).unwrap();

        assert_eq!(bindshim_resolve_inventory(c_path.as_ptr()), 5);
        assert_eq!(bindshim_binding_epoch(), 5);
        assert_eq!(take_string(bindshim_binding_name()).as_deref(), Some("PySide2"));

        let signal = CString::new("Signal").unwrap();
        assert_eq!(
            take_string(bindshim_symbol_source(signal.as_ptr())).as_deref(),
            Some("PySide2.QtCore.Signal")
        );
        let unknown = CString::new("QNotASymbol").unwrap();
        assert!(bindshim_symbol_source(unknown.as_ptr()).is_null());

        // Resolution is one-time: a second inventory does not change the outcome.
        let other = dir.path().join("other.json");
        let pyqt6 = Inventory::satisfying(&builtin_candidates()[0]);
        fs::write(&other, serde_json::to_string(&pyqt6).unwrap()).unwrap();
        let c_other = CString::new(other.to_string_lossy().as_bytes()).unwrap();
        assert_eq!(bindshim_resolve_inventory(c_other.as_ptr()), 5);

        // Nor does an inventory that cannot be read at all.
        let c_missing = CString::new(dir.path().join("absent.json").to_string_lossy().as_bytes()).unwrap();
        assert_eq!(bindshim_resolve_inventory(c_missing.as_ptr()), 5);
        assert!(matches!(registry::outcome(), Some(Ok(table)) if table.epoch() == 5));
    }

    #[test]
    fn null_arguments_are_rejected() {
        assert_eq!(bindshim_resolve_inventory(ptr::null()), -1);
        assert!(bindshim_symbol_source(ptr::null()).is_null());
        assert_eq!(bindshim_install(ptr::null(), ptr::null()), CResultCode::Error as c_int);
        bindshim_free_string(ptr::null_mut());
    }

    #[test]
    fn install_reports_missing_staging_as_error() {
        let staging = tempfile::TempDir::new().unwrap();
        let user = tempfile::TempDir::new().unwrap();
        let c_staging = CString::new(staging.path().to_string_lossy().as_bytes()).unwrap();
        let c_user = CString::new(user.path().to_string_lossy().as_bytes()).unwrap();

        assert_eq!(bindshim_install(c_staging.as_ptr(), c_user.as_ptr()), CResultCode::Error as c_int);
    }
}
