//! Manager configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use jsonloc_common::{Error, Result};
use jsonloc_locations::UserLocation;

/// Default name of the per-module storage directory.
pub const DEFAULT_SUBDIRECTORY_NAME: &str = "acf-json";

/// Default name of the staging cache directory.
pub const DEFAULT_STAGING_DIR_NAME: &str = "ajlm";

/// Default document file extension.
pub const DEFAULT_DOCUMENT_EXTENSION: &str = "json";

/// Configuration of a [`LocationManager`](crate::LocationManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ManagerConfig {
    /// Name of the per-module storage directory.
    pub subdirectory_name: String,
    /// Name of the staging cache directory under the scratch base.
    pub staging_dir_name: String,
    /// Reserved.
    pub auto_sync: bool,
    /// Presentational; carried for hosts that render a location column.
    pub include_column: bool,
    /// Document file extension, without the dot.
    pub document_extension: String,
    /// Offer locations of disabled modules.
    pub include_inactive_modules: bool,
    /// Rebuild the staging cache after every discovery pass.
    pub rebuild_on_refresh: bool,
    /// Tolerated failed/total copy ratio for a complete staging cache.
    pub max_copy_failure_ratio: f64,
    /// Locations outside the module convention.
    pub user_locations: Vec<UserLocation>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            subdirectory_name: DEFAULT_SUBDIRECTORY_NAME.to_string(),
            staging_dir_name: DEFAULT_STAGING_DIR_NAME.to_string(),
            auto_sync: false,
            include_column: true,
            document_extension: DEFAULT_DOCUMENT_EXTENSION.to_string(),
            include_inactive_modules: false,
            rebuild_on_refresh: true,
            max_copy_failure_ratio: 0.0,
            user_locations: Vec::new(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from a JSON file.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check the configuration for values the core cannot work with.
    pub fn validate(&self) -> Result<()> {
        check_dir_name("subdirectoryName", &self.subdirectory_name)?;
        check_dir_name("stagingDirName", &self.staging_dir_name)?;

        if self.document_extension.is_empty() {
            return Err(Error::Config("documentExtension cannot be empty".to_string()));
        }
        if self.document_extension.starts_with('.') || has_separator(&self.document_extension) {
            return Err(Error::Config(format!(
                "documentExtension must be a bare extension, got '{}'",
                self.document_extension
            )));
        }
        if !(0.0..=1.0).contains(&self.max_copy_failure_ratio) {
            return Err(Error::Config(format!(
                "maxCopyFailureRatio must be within [0, 1], got {}",
                self.max_copy_failure_ratio
            )));
        }
        Ok(())
    }
}

fn has_separator(s: &str) -> bool {
    s.contains('/') || s.contains('\\')
}

fn check_dir_name(field: &str, name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::Config(format!("{} cannot be '{}'", field, name)));
    }
    if has_separator(name) {
        return Err(Error::Config(format!(
            "{} must be a single directory name, got '{}'",
            field, name
        )));
    }
    Ok(())
}
