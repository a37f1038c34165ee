//! Document sync engine.
//!
//! Resolves where a document is persisted and keeps at most one copy of it
//! across all registered locations.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use jsonloc_common::{DocumentId, Error, Result};
use jsonloc_locations::{Location, LocationRegistry, RegistrySnapshot};

use crate::fsutil::{remove_if_exists, stamp_modified, write_error, write_atomic};
use crate::state::{DocumentSnapshot, DocumentState, DocumentTracker};

/// Engine handling save, delete, trash and untrash of documents.
pub struct SyncEngine {
    /// Source of valid locations.
    registry: Arc<LocationRegistry>,
    /// Document file extension.
    extension: String,
    /// Lifecycle state of touched documents.
    tracker: RwLock<DocumentTracker>,
}

impl SyncEngine {
    /// Create an engine reading locations from `registry`.
    pub fn new(registry: Arc<LocationRegistry>, extension: impl Into<String>) -> Self {
        Self {
            registry,
            extension: extension.into(),
            tracker: RwLock::new(DocumentTracker::new()),
        }
    }

    /// Current lifecycle state of a document.
    pub async fn state(&self, id: &DocumentId) -> DocumentState {
        self.tracker.read().await.state(id)
    }

    /// Save a document into the chosen location.
    ///
    /// # Postconditions
    /// - `<location>/<id>.<ext>` holds `payload`
    /// - Copies in every other location are removed (best effort)
    ///
    /// # Errors
    /// - `NoLocation` if no key was chosen
    /// - `LocationNotFound` if the key does not resolve
    /// - `NotWritable` if the location directory cannot be written
    ///
    /// On error no existing copy is touched.
    pub async fn save(
        &self,
        id: &DocumentId,
        payload: &[u8],
        chosen_key: Option<&str>,
    ) -> Result<PathBuf> {
        let key = chosen_key.ok_or(Error::NoLocation)?;
        let snapshot = self.registry.snapshot();
        let location = resolve(&snapshot, key)?;

        let target = location.document_path(id, &self.extension);
        write_atomic(&target, payload)
            .await
            .map_err(|e| write_error(&location.path, e))?;
        debug!("Saved {} to {}", id, target.display());

        let strays = self.remove_strays(&snapshot, id, location).await;

        let mut tracker = self.tracker.write().await;
        tracker.transition(id, DocumentState::Assigned(location.key.clone()));
        tracker.add_strays(id, strays);

        info!("Document {} saved in {} ({} stray copies removed)", id, location.key, strays);
        Ok(target)
    }

    /// Remove a document from a location.
    ///
    /// A missing file is not an error.
    pub async fn delete(&self, id: &DocumentId, at_key: &str) -> Result<()> {
        let snapshot = self.registry.snapshot();
        let location = resolve(&snapshot, at_key)?;
        let path = location.document_path(id, &self.extension);

        if !location.is_valid() {
            warn!(
                "Location {} directory has vanished: {}",
                location.key,
                location.path.display()
            );
        }

        let removed = remove_if_exists(&path)
            .await
            .map_err(|e| write_error(&location.path, e))?;
        if removed {
            info!("Document {} deleted from {}", id, location.key);
        } else {
            debug!("Document {} already absent from {}", id, location.key);
        }

        self.tracker.write().await.transition(id, DocumentState::Deleted);
        Ok(())
    }

    /// Mark a document as trashed.
    ///
    /// Trash is a logical state: the file stays where it is. A missing file
    /// is logged, not reported.
    pub async fn trash(&self, id: &DocumentId, at_key: &str) -> Result<()> {
        let snapshot = self.registry.snapshot();
        let location = resolve(&snapshot, at_key)?;
        let path = location.document_path(id, &self.extension);

        if !location.is_valid() {
            warn!(
                "Location {} directory has vanished: {}",
                location.key,
                location.path.display()
            );
        } else if !fs::try_exists(&path).await.unwrap_or(false) {
            warn!(
                "Trashed document {} has no file in {} ({})",
                id,
                location.key,
                path.display()
            );
        }

        self.tracker
            .write()
            .await
            .transition(id, DocumentState::Trashed(location.key.clone()));
        Ok(())
    }

    /// Restore a document from trash into `at_key`.
    ///
    /// When a stray copy exists in another location (left by a host-side
    /// update that wrote to a default location) or the canonical copy is
    /// missing, the canonical copy is rewritten from `snapshot` and stamped
    /// with `snapshot.modified`. Strays are removed only once that write has
    /// succeeded.
    pub async fn untrash(
        &self,
        id: &DocumentId,
        snapshot: &DocumentSnapshot,
        at_key: &str,
    ) -> Result<()> {
        let registry = self.registry.snapshot();
        let location = resolve(&registry, at_key)?;
        let target = location.document_path(id, &self.extension);

        let stray_found = self.has_strays(&registry, id, location).await;
        let present = fs::try_exists(&target).await.unwrap_or(false);

        let mut strays = 0;
        if stray_found || !present {
            write_atomic(&target, &snapshot.payload)
                .await
                .map_err(|e| write_error(&location.path, e))?;
            if let Err(e) = stamp_modified(&target, snapshot.modified).await {
                warn!("Cannot stamp modification time on {}: {}", target.display(), e);
            }
            strays = self.remove_strays(&registry, id, location).await;
            info!(
                "Document {} restored in {} ({} stray copies removed)",
                id, location.key, strays
            );
        } else {
            debug!("Document {} restored in place in {}", id, location.key);
        }

        let mut tracker = self.tracker.write().await;
        tracker.transition(id, DocumentState::Assigned(location.key.clone()));
        tracker.add_strays(id, strays);
        Ok(())
    }

    /// Every location currently holding a copy of the document.
    pub async fn locate(&self, id: &DocumentId) -> Vec<Location> {
        let snapshot = self.registry.snapshot();
        let mut found = Vec::new();
        for location in snapshot.locations() {
            let path = location.document_path(id, &self.extension);
            if fs::try_exists(&path).await.unwrap_or(false) {
                found.push(location.clone());
            }
        }
        found
    }

    /// Whether any location but `keep` holds a copy of `id`.
    async fn has_strays(
        &self,
        snapshot: &RegistrySnapshot,
        id: &DocumentId,
        keep: &Location,
    ) -> bool {
        for location in snapshot.locations() {
            if location.key == keep.key || location.path == keep.path {
                continue;
            }
            let path = location.document_path(id, &self.extension);
            if fs::try_exists(&path).await.unwrap_or(false) {
                return true;
            }
        }
        false
    }

    /// Delete copies of `id` from every location but `keep`.
    ///
    /// Failures are logged; returns the number of copies removed.
    async fn remove_strays(
        &self,
        snapshot: &RegistrySnapshot,
        id: &DocumentId,
        keep: &Location,
    ) -> usize {
        let mut removed = 0;
        for location in snapshot.locations() {
            if location.key == keep.key || location.path == keep.path {
                continue;
            }
            let path = location.document_path(id, &self.extension);
            match remove_if_exists(&path).await {
                Ok(true) => {
                    debug!("Removed stray copy {}", path.display());
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!("Failed to remove stray copy {}: {}", path.display(), e),
            }
        }
        removed
    }
}

fn resolve<'a>(snapshot: &'a RegistrySnapshot, key: &str) -> Result<&'a Location> {
    snapshot
        .get(key)
        .ok_or_else(|| Error::LocationNotFound(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use jsonloc_common::{LocationKey, LocationKind};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        engine: SyncEngine,
        dirs: Vec<PathBuf>,
    }

    fn fixture(keys: &[&str]) -> Fixture {
        let temp = TempDir::new().unwrap();
        let registry = Arc::new(LocationRegistry::new());
        let mut dirs = Vec::new();
        let locations = keys
            .iter()
            .map(|key| {
                let dir = temp.path().join(key).join("acf-json");
                std::fs::create_dir_all(&dir).unwrap();
                dirs.push(dir.clone());
                Location::new(LocationKey::new(*key).unwrap(), LocationKind::Plugin, *key, dir)
            })
            .collect();
        registry.replace(locations);

        Fixture {
            _temp: temp,
            engine: SyncEngine::new(registry, "json"),
            dirs,
        }
    }

    fn id(s: &str) -> DocumentId {
        DocumentId::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_save_writes_to_chosen_location() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        let path = f.engine.save(&id("doc"), b"{}", Some("plugin-b")).await.unwrap();

        assert_eq!(path, f.dirs[1].join("doc.json"));
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
        assert_eq!(
            f.engine.state(&id("doc")).await,
            DocumentState::Assigned(LocationKey::new("plugin-b").unwrap())
        );
    }

    #[tokio::test]
    async fn test_save_relocates() {
        let f = fixture(&["plugin-a", "plugin-b", "plugin-c"]);
        f.engine.save(&id("doc"), b"1", Some("plugin-a")).await.unwrap();
        f.engine.save(&id("doc"), b"2", Some("plugin-c")).await.unwrap();

        let holders = f.engine.locate(&id("doc")).await;
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].key.as_str(), "plugin-c");
        assert!(!f.dirs[0].join("doc.json").exists());
    }

    #[tokio::test]
    async fn test_save_without_location_leaves_copies() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        std::fs::write(f.dirs[0].join("doc.json"), "a").unwrap();
        std::fs::write(f.dirs[1].join("doc.json"), "b").unwrap();

        let none = f.engine.save(&id("doc"), b"new", None).await;
        assert!(matches!(none, Err(Error::NoLocation)));

        let unknown = f.engine.save(&id("doc"), b"new", Some("plugin-z")).await;
        assert!(matches!(unknown, Err(Error::LocationNotFound(_))));

        assert_eq!(std::fs::read_to_string(f.dirs[0].join("doc.json")).unwrap(), "a");
        assert_eq!(std::fs::read_to_string(f.dirs[1].join("doc.json")).unwrap(), "b");
        assert_eq!(f.engine.state(&id("doc")).await, DocumentState::Unassigned);
    }

    #[tokio::test]
    async fn test_save_to_vanished_directory_is_not_writable() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        std::fs::write(f.dirs[0].join("doc.json"), "keep").unwrap();
        std::fs::remove_dir_all(&f.dirs[1]).unwrap();

        let result = f.engine.save(&id("doc"), b"x", Some("plugin-b")).await;
        assert!(matches!(result, Err(Error::NotWritable(p)) if p == f.dirs[1]));
        assert!(f.dirs[0].join("doc.json").exists());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let f = fixture(&["plugin-a"]);
        f.engine.save(&id("doc"), b"x", Some("plugin-a")).await.unwrap();

        f.engine.delete(&id("doc"), "plugin-a").await.unwrap();
        f.engine.delete(&id("doc"), "plugin-a").await.unwrap();

        assert!(!f.dirs[0].join("doc.json").exists());
        assert_eq!(f.engine.state(&id("doc")).await, DocumentState::Deleted);
    }

    #[tokio::test]
    async fn test_delete_unknown_location() {
        let f = fixture(&["plugin-a"]);
        let result = f.engine.delete(&id("doc"), "plugin-z").await;
        assert!(matches!(result, Err(Error::LocationNotFound(_))));
    }

    #[tokio::test]
    async fn test_trash_keeps_file() {
        let f = fixture(&["plugin-a"]);
        f.engine.save(&id("doc"), b"x", Some("plugin-a")).await.unwrap();
        f.engine.trash(&id("doc"), "plugin-a").await.unwrap();

        assert!(f.dirs[0].join("doc.json").exists());
        assert_eq!(
            f.engine.state(&id("doc")).await,
            DocumentState::Trashed(LocationKey::new("plugin-a").unwrap())
        );
    }

    #[tokio::test]
    async fn test_untrash_removes_stray_and_rewrites() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        f.engine.save(&id("doc"), b"original", Some("plugin-a")).await.unwrap();
        f.engine.trash(&id("doc"), "plugin-a").await.unwrap();
        // A host-side update wrote the document into another location.
        std::fs::write(f.dirs[1].join("doc.json"), "stray").unwrap();

        let when = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let snapshot = DocumentSnapshot::new(b"restored".to_vec(), when);
        f.engine.untrash(&id("doc"), &snapshot, "plugin-a").await.unwrap();

        let canonical = f.dirs[0].join("doc.json");
        assert!(!f.dirs[1].join("doc.json").exists());
        assert_eq!(std::fs::read_to_string(&canonical).unwrap(), "restored");
        let modified: chrono::DateTime<Utc> =
            std::fs::metadata(&canonical).unwrap().modified().unwrap().into();
        assert_eq!(modified, when);
    }

    #[tokio::test]
    async fn test_untrash_without_stray_keeps_file() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        f.engine.save(&id("doc"), b"original", Some("plugin-a")).await.unwrap();

        let snapshot = DocumentSnapshot::new(b"snapshot".to_vec(), Utc::now());
        f.engine.untrash(&id("doc"), &snapshot, "plugin-a").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(f.dirs[0].join("doc.json")).unwrap(),
            "original"
        );
    }

    #[tokio::test]
    async fn test_untrash_failed_write_keeps_stray() {
        let f = fixture(&["plugin-a", "plugin-b"]);
        std::fs::write(f.dirs[1].join("doc.json"), "only copy").unwrap();
        std::fs::remove_dir_all(&f.dirs[0]).unwrap();

        let snapshot = DocumentSnapshot::new(b"restored".to_vec(), Utc::now());
        let result = f.engine.untrash(&id("doc"), &snapshot, "plugin-a").await;

        assert!(matches!(result, Err(Error::NotWritable(p)) if p == f.dirs[0]));
        assert_eq!(
            std::fs::read_to_string(f.dirs[1].join("doc.json")).unwrap(),
            "only copy"
        );
        assert_eq!(f.engine.locate(&id("doc")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_trash_and_delete_in_vanished_location() {
        let f = fixture(&["plugin-a"]);
        std::fs::remove_dir_all(&f.dirs[0]).unwrap();

        f.engine.trash(&id("doc"), "plugin-a").await.unwrap();
        f.engine.delete(&id("doc"), "plugin-a").await.unwrap();
        assert_eq!(f.engine.state(&id("doc")).await, DocumentState::Deleted);
    }

    #[tokio::test]
    async fn test_untrash_recreates_missing_copy() {
        let f = fixture(&["plugin-a"]);
        let snapshot = DocumentSnapshot::new(b"snapshot".to_vec(), Utc::now());
        f.engine.untrash(&id("doc"), &snapshot, "plugin-a").await.unwrap();

        assert_eq!(
            std::fs::read_to_string(f.dirs[0].join("doc.json")).unwrap(),
            "snapshot"
        );
    }
}
