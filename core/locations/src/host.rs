//! Host adapter boundary.
//!
//! The host (a CMS, a CLI manifest, a test fixture) tells the core which
//! modules exist, which theme is active and where scratch files may go.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use jsonloc_common::{Error, LocationKind, Result};

/// A module directory that may contribute a storage location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleRoot {
    /// Root directory of the module.
    pub root: PathBuf,
    /// Human-readable module name.
    pub display_name: String,
    /// Role of the module.
    #[serde(default = "default_module_kind")]
    pub kind: LocationKind,
    /// Whether the module is currently enabled.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_module_kind() -> LocationKind {
    LocationKind::Plugin
}

fn default_active() -> bool {
    true
}

impl ModuleRoot {
    /// Create an active plugin module root.
    pub fn plugin(root: impl Into<PathBuf>, display_name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            display_name: display_name.into(),
            kind: LocationKind::Plugin,
            active: true,
        }
    }

    /// Mark the module as disabled.
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Parent of a child theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentTheme {
    /// Display name of the parent theme.
    pub name: String,
    /// Template directory of the parent theme.
    pub dir: PathBuf,
}

/// The currently active theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeInfo {
    /// Display name of the active theme.
    pub name: String,
    /// Stylesheet directory of the active theme.
    pub dir: PathBuf,
    /// Parent theme, when the active theme is a child theme.
    #[serde(default)]
    pub parent: Option<ParentTheme>,
}

impl ThemeInfo {
    /// Check if the active theme is a child theme.
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }
}

/// Data the core consumes from its host.
pub trait HostEnvironment: Send + Sync {
    /// Candidate module directories, in host order.
    fn module_roots(&self) -> Vec<ModuleRoot>;

    /// The active theme, if the host has one.
    fn current_theme(&self) -> Option<ThemeInfo>;

    /// Base directory under which the staging cache is created.
    fn scratch_base_dir(&self) -> PathBuf;
}

/// Host backed by a fixed description, typically read from a JSON manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticHost {
    /// Module roots offered to discovery.
    #[serde(default)]
    pub modules: Vec<ModuleRoot>,
    /// Active theme.
    #[serde(default)]
    pub theme: Option<ThemeInfo>,
    /// Scratch base directory.
    #[serde(default = "std::env::temp_dir")]
    pub scratch_dir: PathBuf,
}

impl StaticHost {
    /// Create a host with no modules and no theme.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules: Vec::new(),
            theme: None,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Add a module root.
    pub fn with_module(mut self, module: ModuleRoot) -> Self {
        self.modules.push(module);
        self
    }

    /// Set the active theme.
    pub fn with_theme(mut self, theme: ThemeInfo) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Parse a manifest from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a manifest file.
    ///
    /// Relative paths in the manifest are resolved against the manifest's
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read manifest {}: {}", path.display(), e))
        })?;
        let mut host = Self::from_json(&content)?;

        if let Some(base) = path.parent() {
            host.resolve_relative(base);
        }
        Ok(host)
    }

    fn resolve_relative(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };

        for module in &mut self.modules {
            resolve(&mut module.root);
        }
        if let Some(theme) = &mut self.theme {
            resolve(&mut theme.dir);
            if let Some(parent) = &mut theme.parent {
                resolve(&mut parent.dir);
            }
        }
        resolve(&mut self.scratch_dir);
    }
}

impl HostEnvironment for StaticHost {
    fn module_roots(&self) -> Vec<ModuleRoot> {
        self.modules.clone()
    }

    fn current_theme(&self) -> Option<ThemeInfo> {
        self.theme.clone()
    }

    fn scratch_base_dir(&self) -> PathBuf {
        self.scratch_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_defaults() {
        let host = StaticHost::from_json(
            r#"{ "modules": [ { "root": "/srv/plugins/forms", "displayName": "Forms" } ] }"#,
        )
        .unwrap();

        assert_eq!(host.modules.len(), 1);
        assert_eq!(host.modules[0].kind, LocationKind::Plugin);
        assert!(host.modules[0].active);
        assert!(host.theme.is_none());
    }

    #[test]
    fn test_manifest_relative_paths() {
        let temp = TempDir::new().unwrap();
        let manifest = temp.path().join("host.json");
        std::fs::write(
            &manifest,
            r#"{
                "modules": [ { "root": "plugins/forms", "displayName": "Forms" } ],
                "theme": { "name": "Kid", "dir": "themes/kid",
                           "parent": { "name": "Base", "dir": "themes/base" } },
                "scratchDir": "uploads"
            }"#,
        )
        .unwrap();

        let host = StaticHost::load(&manifest).unwrap();
        assert_eq!(host.modules[0].root, temp.path().join("plugins/forms"));
        assert_eq!(host.scratch_base_dir(), temp.path().join("uploads"));

        let theme = host.current_theme().unwrap();
        assert!(theme.is_child());
        assert_eq!(theme.parent.unwrap().dir, temp.path().join("themes/base"));
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let temp = TempDir::new().unwrap();
        let result = StaticHost::load(&temp.path().join("nope.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
