//! Discovered storage locations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use jsonloc_common::{DocumentId, LocationKey, LocationKind};

/// A directory eligible to hold persisted documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Stable key, unique within a registry.
    pub key: LocationKey,
    /// Role of the module the directory belongs to.
    pub kind: LocationKind,
    /// Text shown in a location picker.
    pub label: String,
    /// Absolute directory path.
    pub path: PathBuf,
}

impl Location {
    /// Create a location.
    pub fn new(
        key: LocationKey,
        kind: LocationKind,
        label: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            key,
            kind,
            label: label.into(),
            path: path.into(),
        }
    }

    /// Path of a document file inside this location.
    pub fn document_path(&self, id: &DocumentId, extension: &str) -> PathBuf {
        self.path.join(id.file_name(extension))
    }

    /// Whether the directory still exists.
    pub fn is_valid(&self) -> bool {
        self.path.is_dir()
    }
}

/// Natural key for a location of the given kind and label.
pub(crate) fn base_key(kind: LocationKind, label: &str) -> LocationKey {
    match kind {
        LocationKind::Plugin => LocationKey::from_label("plugin", label),
        LocationKind::ThemeChild => LocationKey::from_label("", "theme-child"),
        LocationKind::ThemeParent => LocationKey::from_label("", "theme-parent"),
        LocationKind::ThemeSingle => LocationKey::from_label("", "theme"),
        LocationKind::UserDefined => LocationKey::from_label("user", label),
    }
}
