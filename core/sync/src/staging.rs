//! Staging cache: one scratch directory mirroring every location.
//!
//! A read-only loader that only understands a single directory is pointed at
//! [`StagingCache::path`]. The directory is disposable: it is emptied and
//! refilled by [`StagingCache::rebuild`] and removed by [`StagingCache::purge`].

use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use jsonloc_common::{DocumentId, Error, Result};
use jsonloc_locations::LocationRegistry;

use crate::fsutil::{is_document_file, remove_if_exists};

/// Outcome of a rebuild pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebuildReport {
    /// Stale files removed from the cache before copying.
    pub removed: usize,
    /// Document files found across all locations.
    pub total: usize,
    /// Files copied into the cache.
    pub copied: usize,
    /// Files that failed to copy.
    pub failed: usize,
    /// Locations whose directory could not be read.
    pub skipped_locations: usize,
}

impl RebuildReport {
    /// Fraction of document files that failed to copy.
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }

    /// Whether the cache can be treated as a complete mirror.
    pub fn is_complete(&self, max_failure_ratio: f64) -> bool {
        self.skipped_locations == 0 && self.failure_ratio() <= max_failure_ratio
    }
}

/// Scratch directory holding a flattened copy of every location's documents.
#[derive(Debug, Clone)]
pub struct StagingCache {
    dir: PathBuf,
    extension: String,
}

impl StagingCache {
    /// Create a cache rooted at `dir` for documents with `extension`.
    ///
    /// Nothing is created on disk until the first rebuild.
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Directory handed to the read-only loader.
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Rebuild the cache from every location in the registry.
    ///
    /// # Postconditions
    /// - Every document file of every location has a same-named copy in the
    ///   cache; on name collisions the last location in registry order wins
    /// - Files no longer present in any location are gone
    ///
    /// # Errors
    /// - `NotWritable` if the cache path is not a writable directory
    ///
    /// Individual remove or copy failures are counted and logged only.
    pub async fn rebuild(&self, registry: &LocationRegistry) -> Result<RebuildReport> {
        self.ensure_dir().await?;

        let mut report = RebuildReport {
            removed: self.clear_files().await,
            ..Default::default()
        };

        let snapshot = registry.snapshot();
        for location in snapshot.locations() {
            if location.path == self.dir {
                warn!("Location {} is the staging cache itself, skipping", location.key);
                continue;
            }

            let mut entries = match fs::read_dir(&location.path).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read location {}: {}", location.key, e);
                    report.skipped_locations += 1;
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Listing {} stopped early: {}", location.key, e);
                        report.skipped_locations += 1;
                        break;
                    }
                };

                let source = entry.path();
                if !is_document_file(&source, &self.extension).await {
                    continue;
                }
                report.total += 1;

                let target = self.dir.join(entry.file_name());
                match fs::copy(&source, &target).await {
                    Ok(_) => {
                        debug!("Staged {} from {}", target.display(), location.key);
                        report.copied += 1;
                    }
                    Err(e) => {
                        warn!("Failed to stage {}: {}", source.display(), e);
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Staging cache rebuilt at {}: {}/{} copied, {} failed, {} locations skipped",
            self.dir.display(),
            report.copied,
            report.total,
            report.failed,
            report.skipped_locations
        );
        Ok(report)
    }

    /// Remove every file and the directory itself.
    ///
    /// Succeeds when the directory does not exist.
    pub async fn purge(&self) -> Result<()> {
        match fs::metadata(&self.dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                warn!(
                    "Staging path {} is not a directory, nothing to purge",
                    self.dir.display()
                );
                return Ok(());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::Io(e)),
        }

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Error::Io(e)),
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Listing {} stopped early: {}", self.dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            let result = match entry.file_type().await {
                Ok(t) if t.is_dir() => fs::remove_dir_all(&path).await,
                _ => remove_if_exists(&path).await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!("Failed to purge {}: {}", path.display(), e);
            }
        }

        match fs::remove_dir(&self.dir).await {
            Ok(()) => {
                info!("Staging cache purged: {}", self.dir.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::CopyFailed(format!(
                "cannot remove staging directory {}: {}",
                self.dir.display(),
                e
            ))),
        }
    }

    /// Ids of the documents currently staged.
    pub async fn documents(&self) -> Result<Vec<DocumentId>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_document_file(&path, &self.extension).await {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                warn!("Skipping staged file with non UTF-8 name: {}", path.display());
                continue;
            };
            match DocumentId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => warn!("Skipping staged file {}: {}", path.display(), e),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Create the directory if needed and check it accepts writes.
    async fn ensure_dir(&self) -> Result<()> {
        match fs::metadata(&self.dir).await {
            Ok(meta) if !meta.is_dir() => return Err(Error::NotWritable(self.dir.clone())),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&self.dir).await.map_err(|e| {
                    warn!("Cannot create staging cache {}: {}", self.dir.display(), e);
                    Error::NotWritable(self.dir.clone())
                })?;
            }
            Err(e) => {
                warn!("Cannot inspect staging cache {}: {}", self.dir.display(), e);
                return Err(Error::NotWritable(self.dir.clone()));
            }
        }

        let probe = self.dir.join(format!(".probe-{}", Uuid::new_v4()));
        fs::write(&probe, b"")
            .await
            .map_err(|_| Error::NotWritable(self.dir.clone()))?;
        if let Err(e) = fs::remove_file(&probe).await {
            warn!("Failed to remove write probe {}: {}", probe.display(), e);
        }
        Ok(())
    }

    /// Remove every file in the cache directory. Best effort.
    async fn clear_files(&self) -> usize {
        let mut removed = 0;
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list staging cache {}: {}", self.dir.display(), e);
                return 0;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Listing {} stopped early: {}", self.dir.display(), e);
                    break;
                }
            };
            let path = entry.path();
            match entry.file_type().await {
                Ok(t) if t.is_dir() => continue,
                _ => {}
            }
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove stale {}: {}", path.display(), e),
            }
        }
        removed
    }
}
