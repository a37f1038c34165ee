//! Location discovery.
//!
//! Scans module roots and the active theme for the storage subdirectory and
//! turns every readable one into a [`Location`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use jsonloc_common::{Error, LocationKey, LocationKind, Result};

use crate::host::{HostEnvironment, ModuleRoot, ThemeInfo};
use crate::location::{base_key, Location};

/// Hook that may add or remove candidates before a discovery pass is final.
pub trait DiscoveryHook: Send + Sync {
    /// Hook name, for logging.
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Transform the candidate list.
    fn apply(&self, locations: Vec<Location>) -> Vec<Location>;
}

impl<F> DiscoveryHook for F
where
    F: Fn(Vec<Location>) -> Vec<Location> + Send + Sync,
{
    fn apply(&self, locations: Vec<Location>) -> Vec<Location> {
        self(locations)
    }
}

/// A user-defined location outside the module convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLocation {
    /// Label shown in a location picker.
    pub label: String,
    /// Directory holding documents.
    pub path: PathBuf,
}

/// Built-in hook appending user-defined locations.
#[derive(Debug, Clone, Default)]
pub struct UserLocations {
    entries: Vec<UserLocation>,
}

impl UserLocations {
    /// Create the hook from configured entries.
    pub fn new(entries: Vec<UserLocation>) -> Self {
        Self { entries }
    }
}

impl DiscoveryHook for UserLocations {
    fn name(&self) -> &str {
        "user-locations"
    }

    fn apply(&self, mut locations: Vec<Location>) -> Vec<Location> {
        for entry in &self.entries {
            if let Err(e) = probe_dir(&entry.path) {
                warn!("Skipping user location '{}': {}", entry.label, e);
                continue;
            }
            locations.push(Location::new(
                base_key(LocationKind::UserDefined, &entry.label),
                LocationKind::UserDefined,
                entry.label.clone(),
                entry.path.clone(),
            ));
        }
        locations
    }
}

/// Discovery settings and hooks.
#[derive(Clone)]
pub struct Discovery {
    subdir_name: String,
    include_inactive: bool,
    hooks: Vec<Arc<dyn DiscoveryHook>>,
}

impl Discovery {
    /// Create a discovery for the given per-module subdirectory name.
    pub fn new(subdir_name: impl Into<String>) -> Self {
        Self {
            subdir_name: subdir_name.into(),
            include_inactive: false,
            hooks: Vec::new(),
        }
    }

    /// Also offer locations of disabled modules.
    pub fn include_inactive(mut self, include: bool) -> Self {
        self.include_inactive = include;
        self
    }

    /// Append a hook. Hooks run in insertion order.
    pub fn with_hook(mut self, hook: Arc<dyn DiscoveryHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Run a discovery pass against a host.
    pub fn discover_host(&self, host: &dyn HostEnvironment) -> Vec<Location> {
        let theme = host.current_theme();
        self.discover(&host.module_roots(), theme.as_ref())
    }

    /// Run a discovery pass.
    ///
    /// # Postconditions
    /// - Every returned location's path is a readable directory
    /// - Keys are unique within the result
    /// - Order: modules in the given order, child theme, parent or single
    ///   theme, then hook additions
    pub fn discover(&self, modules: &[ModuleRoot], theme: Option<&ThemeInfo>) -> Vec<Location> {
        let mut candidates = Vec::new();

        for module in modules {
            if !module.active && !self.include_inactive {
                debug!("Skipping inactive module {}", module.display_name);
                continue;
            }
            let label = module_label(module);
            self.offer(&mut candidates, module.kind, &label, &module.display_name, &module.root);
        }

        if let Some(theme) = theme {
            match &theme.parent {
                Some(parent) => {
                    let child_label = format!("Theme {} (child)", theme.name);
                    self.offer(&mut candidates, LocationKind::ThemeChild, &child_label, &theme.name, &theme.dir);
                    let parent_label = format!("Theme {} (parent)", parent.name);
                    self.offer(&mut candidates, LocationKind::ThemeParent, &parent_label, &parent.name, &parent.dir);
                }
                None => {
                    let label = format!("Theme {}", theme.name);
                    self.offer(&mut candidates, LocationKind::ThemeSingle, &label, &theme.name, &theme.dir);
                }
            }
        }

        for hook in &self.hooks {
            let before = candidates.len();
            candidates = hook.apply(candidates);
            debug!(
                "Discovery hook {} changed candidates {} -> {}",
                hook.name(),
                before,
                candidates.len()
            );
        }

        finalize(candidates)
    }

    fn offer(
        &self,
        candidates: &mut Vec<Location>,
        kind: LocationKind,
        label: &str,
        name: &str,
        root: &Path,
    ) {
        let dir = root.join(&self.subdir_name);
        match probe_dir(&dir) {
            Ok(()) => candidates.push(Location::new(base_key(kind, name), kind, label, dir)),
            Err(e) => debug!("No location for {}: {}", label, e),
        }
    }
}

fn module_label(module: &ModuleRoot) -> String {
    match module.kind {
        LocationKind::Plugin => format!("Plugin {}", module.display_name),
        LocationKind::ThemeChild => format!("Theme {} (child)", module.display_name),
        LocationKind::ThemeParent => format!("Theme {} (parent)", module.display_name),
        LocationKind::ThemeSingle => format!("Theme {}", module.display_name),
        LocationKind::UserDefined => module.display_name.clone(),
    }
}

/// Check that `dir` is an existing, readable directory.
fn probe_dir(dir: &Path) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::DirectoryMissing(dir.to_path_buf()));
    }
    std::fs::read_dir(dir)?;
    Ok(())
}

/// Drop entries a hook left without a directory and make keys unique.
fn finalize(candidates: Vec<Location>) -> Vec<Location> {
    let mut used: HashSet<LocationKey> = HashSet::new();
    let mut locations = Vec::with_capacity(candidates.len());

    for mut location in candidates {
        if !location.path.is_dir() {
            warn!(
                "Dropping location {}: {} is not a directory",
                location.key,
                location.path.display()
            );
            continue;
        }
        location.key = unique_key(&location.key, |k| used.contains(k));
        used.insert(location.key.clone());
        locations.push(location);
    }

    locations
}

/// First of `base`, `base-2`, `base-3`, ... for which `taken` is false.
pub(crate) fn unique_key(base: &LocationKey, taken: impl Fn(&LocationKey) -> bool) -> LocationKey {
    if !taken(base) {
        return base.clone();
    }
    (2..)
        .map(|n| base.with_suffix(n))
        .find(|k| !taken(k))
        .unwrap_or_else(|| base.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{ParentTheme, StaticHost};
    use tempfile::TempDir;

    fn module_with_dir(temp: &TempDir, dir: &str, name: &str) -> ModuleRoot {
        let root = temp.path().join(dir);
        std::fs::create_dir_all(root.join("acf-json")).unwrap();
        ModuleRoot::plugin(root, name)
    }

    #[test]
    fn test_discovers_plugins_with_subdir() {
        let temp = TempDir::new().unwrap();
        let p1 = module_with_dir(&temp, "p1", "Forms");
        let bare = temp.path().join("bare");
        std::fs::create_dir_all(&bare).unwrap();

        let modules = vec![p1, ModuleRoot::plugin(bare, "Bare")];
        let found = Discovery::new("acf-json").discover(&modules, None);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key.as_str(), "plugin-forms");
        assert_eq!(found[0].kind, LocationKind::Plugin);
        assert_eq!(found[0].label, "Plugin Forms");
        assert_eq!(found[0].path, temp.path().join("p1/acf-json"));
    }

    #[test]
    fn test_custom_subdir_name() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("p");
        std::fs::create_dir_all(root.join("fields")).unwrap();

        let modules = vec![ModuleRoot::plugin(&root, "P")];
        assert!(Discovery::new("acf-json").discover(&modules, None).is_empty());
        assert_eq!(Discovery::new("fields").discover(&modules, None).len(), 1);
    }

    #[test]
    fn test_inactive_modules_skipped_by_default() {
        let temp = TempDir::new().unwrap();
        let modules = vec![module_with_dir(&temp, "p", "Off").inactive()];

        assert!(Discovery::new("acf-json").discover(&modules, None).is_empty());
        let found = Discovery::new("acf-json")
            .include_inactive(true)
            .discover(&modules, None);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_duplicate_names_are_disambiguated() {
        let temp = TempDir::new().unwrap();
        let modules = vec![
            module_with_dir(&temp, "a", "Tools"),
            module_with_dir(&temp, "b", "Tools"),
            module_with_dir(&temp, "c", "tools!"),
        ];

        let keys: Vec<String> = Discovery::new("acf-json")
            .discover(&modules, None)
            .into_iter()
            .map(|l| l.key.to_string())
            .collect();
        assert_eq!(keys, vec!["plugin-tools", "plugin-tools-2", "plugin-tools-3"]);
    }

    #[test]
    fn test_child_and_parent_theme() {
        let temp = TempDir::new().unwrap();
        let kid = temp.path().join("themes/kid");
        let base = temp.path().join("themes/base");
        std::fs::create_dir_all(kid.join("acf-json")).unwrap();
        std::fs::create_dir_all(base.join("acf-json")).unwrap();

        let theme = ThemeInfo {
            name: "Kid".to_string(),
            dir: kid,
            parent: Some(ParentTheme {
                name: "Base".to_string(),
                dir: base,
            }),
        };
        let found = Discovery::new("acf-json").discover(&[], Some(&theme));

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].key.as_str(), "theme-child");
        assert_eq!(found[0].label, "Theme Kid (child)");
        assert_eq!(found[1].key.as_str(), "theme-parent");
        assert_eq!(found[1].kind, LocationKind::ThemeParent);
    }

    #[test]
    fn test_single_theme() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("solo");
        std::fs::create_dir_all(dir.join("acf-json")).unwrap();

        let theme = ThemeInfo {
            name: "Solo".to_string(),
            dir,
            parent: None,
        };
        let found = Discovery::new("acf-json").discover(&[], Some(&theme));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key.as_str(), "theme");
        assert_eq!(found[0].kind, LocationKind::ThemeSingle);
    }

    #[test]
    fn test_user_locations_hook() {
        let temp = TempDir::new().unwrap();
        let shared = temp.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();

        let hook = UserLocations::new(vec![
            UserLocation {
                label: "Shared".to_string(),
                path: shared.clone(),
            },
            UserLocation {
                label: "Gone".to_string(),
                path: temp.path().join("gone"),
            },
        ]);
        let found = Discovery::new("acf-json")
            .with_hook(Arc::new(hook))
            .discover(&[], None);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key.as_str(), "user-shared");
        assert_eq!(found[0].kind, LocationKind::UserDefined);
        assert_eq!(found[0].path, shared);
    }

    #[test]
    fn test_closure_hook_can_remove_and_invalid_additions_are_dropped() {
        let temp = TempDir::new().unwrap();
        let host = StaticHost::new(temp.path())
            .with_module(module_with_dir(&temp, "a", "Keep"))
            .with_module(module_with_dir(&temp, "b", "Drop"));
        let missing = temp.path().join("missing");

        let hook = move |locations: Vec<Location>| {
            let mut kept: Vec<Location> = locations
                .into_iter()
                .filter(|l| l.key.as_str() != "plugin-drop")
                .collect();
            kept.push(Location::new(
                LocationKey::new("ghost").unwrap(),
                LocationKind::UserDefined,
                "Ghost",
                missing.clone(),
            ));
            kept
        };
        let found = Discovery::new("acf-json")
            .with_hook(Arc::new(hook))
            .discover_host(&host);

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key.as_str(), "plugin-keep");
    }
}
