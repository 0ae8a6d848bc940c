//! Candidate GUI-binding descriptors and the canonical symbol surface.
//!
//! Each candidate lists the symbols it must supply under their canonical
//! names. A requirement has a primary import path and an ordered list of
//! divergence adapters (alternate export name or alternate module) tried
//! when the primary path is missing.
//!
//! # Built-in candidates (priority order)
//!
//! | candidate | epoch |
//! |-----------|-------|
//! | PyQt6     | 6     |
//! | PySide6   | 6     |
//! | PyQt5     | 5     |
//! | PySide2   | 5     |

use crate::error::SurfaceMismatch;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Bumped whenever a name is added to or removed from `CANONICAL_SYMBOLS`.
pub const SURFACE_VERSION: u32 = 1;

/// Names every resolved table exposes, whichever candidate backs it.
pub const CANONICAL_SYMBOLS: &[&str] = &[
    // QtCore
    "QPoint", "QRect", "QSize", "Qt", "QTimer", "Signal", "QAbstractItemModel", "QModelIndex",
    "QObject", "pyqtProperty", "QPropertyAnimation", "QDir", "QRegExp", "QEvent",
    "QCoreApplication", "QFileInfo", "QRegularExpressionValidator",
    // QtGui
    "QIcon", "QImage", "QPainter", "QPixmap", "QRegion", "QAction", "QColor", "QBrush",
    "QContextMenuEvent", "QShowEvent",
    // QtWidgets
    "QActionGroup", "QLabel", "QMenu", "QWidget", "QStyledItemDelegate", "QApplication",
    "QMainWindow", "QHBoxLayout", "QMessageBox", "QProgressDialog", "QDialog", "QVBoxLayout",
    "QGridLayout", "QFormLayout", "QGroupBox", "QCheckBox", "QComboBox", "QLineEdit",
    "QPlainTextEdit", "QPushButton", "QSpinBox", "QTabWidget", "QTableWidget",
    "QTableWidgetItem", "QHeaderView", "QAbstractItemView", "QFileDialog", "QSplitter",
    "QTableView", "QSizePolicy", "QColorDialog",
    // application accessor
    "qApp",
];

/// Names that may be absent without failing resolution.
pub const OPTIONAL_SYMBOLS: &[&str] = &["sip"];

const CORE: &[&str] = &[
    "QPoint", "QRect", "QSize", "Qt", "QTimer", "QAbstractItemModel", "QModelIndex", "QObject",
    "QPropertyAnimation", "QDir", "QEvent", "QCoreApplication", "QFileInfo",
];

const GUI: &[&str] = &[
    "QIcon", "QImage", "QPainter", "QPixmap", "QRegion", "QColor", "QBrush", "QContextMenuEvent",
    "QShowEvent",
];

const WIDGETS: &[&str] = &[
    "QActionGroup", "QLabel", "QMenu", "QWidget", "QStyledItemDelegate", "QApplication",
    "QMainWindow", "QHBoxLayout", "QMessageBox", "QProgressDialog", "QDialog", "QVBoxLayout",
    "QGridLayout", "QFormLayout", "QGroupBox", "QCheckBox", "QComboBox", "QLineEdit",
    "QPlainTextEdit", "QPushButton", "QSpinBox", "QTabWidget", "QTableWidget",
    "QTableWidgetItem", "QHeaderView", "QAbstractItemView", "QFileDialog", "QSplitter",
    "QTableView", "QSizePolicy", "QColorDialog",
];

/// A `(module, export)` pair. An export of `None` imports the module itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolPath {
    pub module: String,
    pub export: Option<String>,
}

impl SymbolPath {
    pub fn new(module: impl Into<String>, export: impl Into<String>) -> Self {
        Self { module: module.into(), export: Some(export.into()) }
    }

    pub fn module(module: impl Into<String>) -> Self {
        Self { module: module.into(), export: None }
    }
}

impl fmt::Display for SymbolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.export {
            Some(export) => write!(f, "{}.{}", self.module, export),
            None => f.write_str(&self.module),
        }
    }
}

/// One canonical symbol a candidate must (or may) supply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub canonical: String,
    pub primary: SymbolPath,
    pub adapters: Vec<SymbolPath>,
}

impl Requirement {
    /// Primary path followed by the adapters, in the order they are tried.
    pub fn alternatives(&self) -> impl Iterator<Item = &SymbolPath> {
        std::iter::once(&self.primary).chain(self.adapters.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateBinding {
    pub name: String,
    pub epoch: u32,
    pub required: Vec<Requirement>,
    pub optional: Vec<Requirement>,
    /// Names passed to [`CandidateBinding::adapter`] before being declared.
    pub unattached_adapters: Vec<String>,
}

impl CandidateBinding {
    pub fn new(name: impl Into<String>, epoch: u32) -> Self {
        Self {
            name: name.into(),
            epoch,
            required: Vec::new(),
            optional: Vec::new(),
            unattached_adapters: Vec::new(),
        }
    }

    /// Require each name from `module` under the same canonical name.
    pub fn import(mut self, module: &str, names: &[&str]) -> Self {
        for name in names {
            self.required.push(Requirement {
                canonical: (*name).to_string(),
                primary: SymbolPath::new(module, *name),
                adapters: Vec::new(),
            });
        }
        self
    }

    /// Require `canonical`, supplied by `export` from `module`.
    pub fn rename(mut self, canonical: &str, module: &str, export: &str) -> Self {
        self.required.push(Requirement {
            canonical: canonical.to_string(),
            primary: SymbolPath::new(module, export),
            adapters: Vec::new(),
        });
        self
    }

    /// Add an alternative path for an already declared symbol.
    ///
    /// An adapter for a name that has not been declared yet attaches to
    /// nothing; it is kept in `unattached_adapters` and fails [`validate`].
    ///
    /// [`validate`]: CandidateBinding::validate
    pub fn adapter(mut self, canonical: &str, module: &str, export: &str) -> Self {
        match self
            .required
            .iter_mut()
            .chain(self.optional.iter_mut())
            .find(|r| r.canonical == canonical)
        {
            Some(req) => req.adapters.push(SymbolPath::new(module, export)),
            None => self.unattached_adapters.push(canonical.to_string()),
        }
        self
    }

    /// Declare a module-level import whose absence does not disqualify the candidate.
    pub fn optional_module(mut self, canonical: &str, modules: &[&str]) -> Self {
        let mut paths = modules.iter().map(|m| SymbolPath::module(*m));
        if let Some(primary) = paths.next() {
            self.optional.push(Requirement {
                canonical: canonical.to_string(),
                primary,
                adapters: paths.collect(),
            });
        }
        self
    }

    pub fn requirement(&self, canonical: &str) -> Option<&Requirement> {
        self.required.iter().find(|r| r.canonical == canonical)
    }

    /// Check that required and optional names match the canonical surface exactly.
    pub fn validate(&self) -> Result<(), SurfaceMismatch> {
        let expected: BTreeSet<&str> = CANONICAL_SYMBOLS
            .iter()
            .chain(OPTIONAL_SYMBOLS.iter())
            .copied()
            .collect();
        let declared: BTreeSet<&str> = self
            .required
            .iter()
            .chain(self.optional.iter())
            .map(|r| r.canonical.as_str())
            .collect();

        let mut missing: Vec<String> = expected.difference(&declared).map(|s| s.to_string()).collect();
        let mut extra: Vec<String> = declared.difference(&expected).map(|s| s.to_string()).collect();

        // An optional name declared as required (or the reverse) is also a mismatch.
        for req in &self.required {
            if OPTIONAL_SYMBOLS.contains(&req.canonical.as_str()) {
                extra.push(req.canonical.clone());
            }
        }
        for req in &self.optional {
            if CANONICAL_SYMBOLS.contains(&req.canonical.as_str()) {
                missing.push(req.canonical.clone());
            }
        }

        let declared_count = self.required.len() + self.optional.len();
        if missing.is_empty()
            && extra.is_empty()
            && self.unattached_adapters.is_empty()
            && declared_count == expected.len()
        {
            Ok(())
        } else {
            if declared_count != declared.len() {
                extra.push("<duplicate declaration>".to_string());
            }
            Err(SurfaceMismatch {
                candidate: self.name.clone(),
                missing,
                extra,
                unattached_adapters: self.unattached_adapters.clone(),
            })
        }
    }
}

/// The built-in candidates, newest first, deprecated last.
pub fn builtin_candidates() -> Vec<CandidateBinding> {
    vec![pyqt6(), pyside6(), pyqt5(), pyside2()]
}

fn pyqt6() -> CandidateBinding {
    CandidateBinding::new("PyQt6", 6)
        .import("PyQt6.QtCore", CORE)
        .import("PyQt6.QtCore", &["pyqtProperty"])
        .rename("Signal", "PyQt6.QtCore", "pyqtSignal")
        .adapter("Signal", "PyQt6.QtCore", "Signal")
        .rename("QRegExp", "PyQt6.QtCore", "QRegularExpression")
        .adapter("QRegExp", "PyQt6.QtGui", "QRegularExpression")
        .import("PyQt6.QtGui", GUI)
        .import("PyQt6.QtGui", &["QAction", "QRegularExpressionValidator"])
        .import("PyQt6.QtWidgets", WIDGETS)
        .rename("qApp", "PyQt6.QtWidgets", "QApplication.instance")
        .optional_module("sip", &["PyQt6.sip", "sip"])
}

fn pyside6() -> CandidateBinding {
    CandidateBinding::new("PySide6", 6)
        .import("PySide6.QtCore", CORE)
        .import("PySide6.QtCore", &["Signal"])
        .rename("pyqtProperty", "PySide6.QtCore", "Property")
        .rename("QRegExp", "PySide6.QtCore", "QRegularExpression")
        .import("PySide6.QtGui", GUI)
        .import("PySide6.QtGui", &["QAction", "QRegularExpressionValidator"])
        .import("PySide6.QtWidgets", WIDGETS)
        .rename("qApp", "PySide6.QtWidgets", "QApplication.instance")
        .optional_module("sip", &["sip"])
}

fn pyqt5() -> CandidateBinding {
    CandidateBinding::new("PyQt5", 5)
        .import("PyQt5.QtCore", CORE)
        .import("PyQt5.QtCore", &["pyqtProperty", "QRegExp"])
        .rename("Signal", "PyQt5.QtCore", "pyqtSignal")
        .import("PyQt5.QtGui", GUI)
        .rename("QRegularExpressionValidator", "PyQt5.QtGui", "QRegExpValidator")
        .import("PyQt5.QtWidgets", WIDGETS)
        .import("PyQt5.QtWidgets", &["QAction", "qApp"])
        .adapter("qApp", "PyQt5.QtWidgets", "QApplication.instance")
        .optional_module("sip", &["PyQt5.sip", "sip"])
}

fn pyside2() -> CandidateBinding {
    CandidateBinding::new("PySide2", 5)
        .import("PySide2.QtCore", CORE)
        .import("PySide2.QtCore", &["Signal", "QRegExp"])
        .rename("pyqtProperty", "PySide2.QtCore", "Property")
        .import("PySide2.QtGui", GUI)
        .rename("QRegularExpressionValidator", "PySide2.QtGui", "QRegExpValidator")
        .import("PySide2.QtWidgets", WIDGETS)
        .import("PySide2.QtWidgets", &["QAction"])
        .rename("qApp", "PySide2.QtWidgets", "QApplication.instance")
        .optional_module("sip", &["sip"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_candidates_cover_canonical_surface() {
        for candidate in builtin_candidates() {
            assert_eq!(candidate.validate(), Ok(()), "{}", candidate.name);
        }
    }

    #[test]
    fn builtin_priority_is_newest_first() {
        let names: Vec<_> = builtin_candidates().into_iter().map(|c| (c.name, c.epoch)).collect();
        assert_eq!(
            names,
            vec![
                ("PyQt6".to_string(), 6),
                ("PySide6".to_string(), 6),
                ("PyQt5".to_string(), 5),
                ("PySide2".to_string(), 5),
            ]
        );
    }

    #[test]
    fn signal_adapter_is_tried_after_primary() {
        let pyqt6 = pyqt6();
        let signal = pyqt6.requirement("Signal").unwrap();
        let paths: Vec<String> = signal.alternatives().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["PyQt6.QtCore.pyqtSignal", "PyQt6.QtCore.Signal"]);
    }

    #[test]
    fn validate_reports_missing_and_extra_names() {
        let candidate = CandidateBinding::new("Partial", 1)
            .import("Mod", &["QPoint", "NotCanonical"]);
        let err = candidate.validate().unwrap_err();
        assert!(err.missing.contains(&"QRect".to_string()));
        assert!(err.missing.contains(&"sip".to_string()));
        assert_eq!(err.extra, vec!["NotCanonical".to_string()]);
    }

    #[test]
    fn adapter_before_its_declaration_fails_validation() {
        let mut candidate = pyqt5();
        candidate.required.retain(|r| r.canonical != "Signal");
        let candidate = candidate
            .adapter("Signal", "PyQt5.QtCore", "pyqtSignal")
            .rename("Signal", "PyQt5.QtCore", "Signal");

        assert_eq!(candidate.unattached_adapters, vec!["Signal".to_string()]);
        assert!(candidate.requirement("Signal").unwrap().adapters.is_empty());

        let err = candidate.validate().unwrap_err();
        assert!(err.missing.is_empty());
        assert!(err.extra.is_empty());
        assert_eq!(err.unattached_adapters, vec!["Signal".to_string()]);
    }

    #[test]
    fn module_paths_display_without_export() {
        assert_eq!(SymbolPath::module("sip").to_string(), "sip");
        assert_eq!(SymbolPath::new("PyQt5.QtCore", "QRegExp").to_string(), "PyQt5.QtCore.QRegExp");
    }
}
