//! Symbol sources: what the resolver asks to find out whether a binding is installed.

use crate::binding::{CandidateBinding, SymbolPath};
use crate::error::ImportError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Anything that can answer "is `export` importable from `module`".
pub trait SymbolSource {
    fn import(&self, path: &SymbolPath) -> std::result::Result<(), ImportError>;
}

impl<T: SymbolSource + ?Sized> SymbolSource for &T {
    fn import(&self, path: &SymbolPath) -> std::result::Result<(), ImportError> {
        (**self).import(path)
    }
}

/// Serialized description of the binding modules installed on a machine.
///
/// ```toml
/// [modules]
/// "PyQt5.QtCore" = ["QPoint", "pyqtSignal"]
/// "sip" = []
/// ```
///
/// An export list containing `"*"` exports every name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub modules: BTreeMap<String, BTreeSet<String>>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module<I, S>(mut self, module: impl Into<String>, exports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules
            .entry(module.into())
            .or_default()
            .extend(exports.into_iter().map(Into::into));
        self
    }

    /// Inventory exposing exactly the primary paths of `candidate`'s required symbols.
    pub fn satisfying(candidate: &CandidateBinding) -> Self {
        let mut inventory = Self::new();
        for req in &candidate.required {
            let exports = inventory.modules.entry(req.primary.module.clone()).or_default();
            if let Some(export) = &req.primary.export {
                exports.insert(export.clone());
            }
        }
        inventory
    }

    pub fn without_export(mut self, module: &str, export: &str) -> Self {
        if let Some(exports) = self.modules.get_mut(module) {
            exports.remove(export);
        }
        self
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Failed to parse JSON inventory")
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("Failed to parse TOML inventory")
    }

    /// Load an inventory file; `.toml` files are read as TOML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .context(format!("Failed to read inventory: {:?}", path))?;

        let inventory = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            _ => Self::from_json_str(&content),
        };
        inventory.context(format!("Invalid inventory: {:?}", path))
    }
}

impl SymbolSource for Inventory {
    fn import(&self, path: &SymbolPath) -> std::result::Result<(), ImportError> {
        let exports = self
            .modules
            .get(&path.module)
            .ok_or_else(|| ImportError::ModuleNotFound(path.module.clone()))?;

        let Some(export) = &path.export else {
            return Ok(());
        };

        // `Class.attr` is available whenever `Class` is.
        let owner = export.split('.').next().unwrap_or(export);
        if exports.contains("*") || exports.contains(export) || exports.contains(owner) {
            Ok(())
        } else {
            Err(ImportError::NameNotFound { module: path.module.clone(), name: export.clone() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_module_and_missing_name_are_distinguished() {
        let inv = Inventory::new().with_module("PyQt5.QtCore", ["QPoint"]);

        assert_eq!(
            inv.import(&SymbolPath::new("PyQt6.QtCore", "QPoint")),
            Err(ImportError::ModuleNotFound("PyQt6.QtCore".into()))
        );
        assert_eq!(
            inv.import(&SymbolPath::new("PyQt5.QtCore", "QRect")),
            Err(ImportError::NameNotFound { module: "PyQt5.QtCore".into(), name: "QRect".into() })
        );
        assert!(inv.import(&SymbolPath::new("PyQt5.QtCore", "QPoint")).is_ok());
    }

    #[test]
    fn module_import_needs_only_the_module() {
        let inv = Inventory::new().with_module("sip", Vec::<String>::new());
        assert!(inv.import(&SymbolPath::module("sip")).is_ok());
        assert!(inv.import(&SymbolPath::module("PyQt5.sip")).is_err());
    }

    #[test]
    fn wildcard_and_attribute_exports() {
        let inv = Inventory::new()
            .with_module("PySide6.QtCore", ["*"])
            .with_module("PySide6.QtWidgets", ["QApplication"]);

        assert!(inv.import(&SymbolPath::new("PySide6.QtCore", "Anything")).is_ok());
        assert!(inv.import(&SymbolPath::new("PySide6.QtWidgets", "QApplication.instance")).is_ok());
        assert!(inv.import(&SymbolPath::new("PySide6.QtWidgets", "QWidget.instance")).is_err());
    }

    #[test]
    fn parses_json_and_toml() {
        let json = r#"{"modules": {"PyQt5.QtCore": ["QPoint", "pyqtSignal"], "sip": []}}"#;
        let toml = r#"
            [modules]
            "PyQt5.QtCore" = ["QPoint", "pyqtSignal"]
            "sip" = []
        "#;

        let from_json = Inventory::from_json_str(json).unwrap();
        let from_toml = Inventory::from_toml_str(toml).unwrap();
        assert_eq!(from_json, from_toml);
        assert_eq!(from_json.modules.len(), 2);
    }

    #[test]
    fn load_picks_format_from_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bindings.toml");
        fs::write(&path, "[modules]\n\"PySide2.QtCore\" = [\"Signal\"]\n").unwrap();

        let inv = Inventory::load(&path).unwrap();
        assert!(inv.import(&SymbolPath::new("PySide2.QtCore", "Signal")).is_ok());

        let bad = dir.path().join("bindings.json");
        fs::write(&bad, "not json").unwrap();
        assert!(Inventory::load(&bad).is_err());
    }
}
