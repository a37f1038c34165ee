//! Common types used throughout jsonloc.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of the module a location was discovered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LocationKind {
    /// Storage directory inside a plugin.
    Plugin,
    /// Parent theme of the active child theme.
    ThemeParent,
    /// The active child theme.
    ThemeChild,
    /// The active theme when it has no parent.
    ThemeSingle,
    /// Added by a discovery hook, outside the module convention.
    UserDefined,
}

impl LocationKind {
    /// Stable string form, as used in keys and serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LocationKind::Plugin => "plugin",
            LocationKind::ThemeParent => "theme-parent",
            LocationKind::ThemeChild => "theme-child",
            LocationKind::ThemeSingle => "theme-single",
            LocationKind::UserDefined => "user-defined",
        }
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable, human-readable identifier of a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationKey(String);

impl LocationKey {
    /// Create a new LocationKey from a string.
    ///
    /// # Errors
    /// - Returns error if the key is empty or contains whitespace
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "LocationKey cannot be empty".to_string(),
            ));
        }
        if key.chars().any(char::is_whitespace) {
            return Err(crate::Error::InvalidInput(format!(
                "LocationKey cannot contain whitespace: '{}'",
                key
            )));
        }
        Ok(Self(key))
    }

    /// Build a key from a free-form label, prefixed with `prefix`.
    ///
    /// The result is always a valid key.
    pub fn from_label(prefix: &str, label: &str) -> Self {
        let slug = slugify(label);
        if prefix.is_empty() {
            Self(slug)
        } else {
            Self(format!("{}-{}", prefix, slug))
        }
    }

    /// Append a numeric disambiguator (`key-2`, `key-3`, ...).
    pub fn with_suffix(&self, n: usize) -> Self {
        Self(format!("{}-{}", self.0, n))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for LocationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a document, used as its filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Create a new DocumentId.
    ///
    /// # Preconditions
    /// - `id` must be non-empty
    /// - `id` must be usable as a single filename component
    ///
    /// # Errors
    /// - Returns error if id is empty, `.`/`..`, or contains a separator or NUL
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidInput(
                "DocumentId cannot be empty".to_string(),
            ));
        }
        if id == "." || id == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "DocumentId cannot be '{}'",
                id
            )));
        }
        if id.contains('/') || id.contains('\\') || id.contains('\0') {
            return Err(crate::Error::InvalidInput(format!(
                "DocumentId cannot contain separators: '{}'",
                id
            )));
        }
        Ok(Self(id))
    }

    /// File name of this document for the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Turn a display label into a key fragment.
///
/// ASCII alphanumerics are lowercased, every other run of characters becomes
/// a single `-`. An empty result falls back to `location`.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_dash = false;

    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "location".to_string()
    } else {
        slug
    }
}
