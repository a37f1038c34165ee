//! Filesystem helpers shared by the staging cache and the sync engine.

use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use jsonloc_common::{Error, Result};

/// Write `data` to `path` through a temp file in the same directory and a
/// rename, so readers see either the old or the new content.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp = temp_path(path);

    if let Err(e) = fs::write(&temp, data).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, path).await {
        let _ = fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

/// Set the modification time of an existing file.
pub(crate) async fn stamp_modified(path: &Path, modified: DateTime<Utc>) -> Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .await?
        .into_std()
        .await;
    let time: SystemTime = modified.into();

    tokio::task::spawn_blocking(move || file.set_modified(time))
        .await
        .map_err(|e| Error::CopyFailed(format!("set mtime task failed: {}", e)))??;
    Ok(())
}

/// Map a write failure inside `dir` to the error surfaced to the host.
pub(crate) fn write_error(dir: &Path, e: std::io::Error) -> Error {
    match e.kind() {
        ErrorKind::PermissionDenied | ErrorKind::NotFound => Error::NotWritable(dir.to_path_buf()),
        _ => Error::Io(e),
    }
}

/// Remove a file, treating a missing file as success.
///
/// Returns whether a file was actually removed.
pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check whether `path` names a regular document file with `extension`.
pub(crate) async fn is_document_file(path: &Path, extension: &str) -> bool {
    let matches_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == extension);
    if !matches_ext {
        return false;
    }
    match fs::metadata(path).await {
        Ok(meta) => meta.is_file(),
        Err(e) => {
            warn!("Cannot stat {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");

        write_atomic(&path, b"one").await.unwrap();
        write_atomic(&path, b"two").await.unwrap();

        assert_eq!(fs::read(&path).await.unwrap(), b"two");
        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_write_atomic_missing_dir() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("missing");
        let err = write_atomic(&dir.join("doc.json"), b"x").await.unwrap_err();
        assert!(matches!(write_error(&dir, err), Error::NotWritable(_)));
    }

    #[tokio::test]
    async fn test_stamp_modified() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, b"x").await.unwrap();

        let when = Utc.with_ymd_and_hms(2020, 5, 17, 8, 30, 0).unwrap();
        stamp_modified(&path, when).await.unwrap();

        let modified: DateTime<Utc> = fs::metadata(&path).await.unwrap().modified().unwrap().into();
        assert_eq!(modified, when);
    }

    #[tokio::test]
    async fn test_remove_if_exists() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        fs::write(&path, b"x").await.unwrap();

        assert!(remove_if_exists(&path).await.unwrap());
        assert!(!remove_if_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_document_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.json"), b"{}").await.unwrap();
        fs::write(temp.path().join("a.txt"), b"").await.unwrap();
        fs::create_dir(temp.path().join("dir.json")).await.unwrap();

        assert!(is_document_file(&temp.path().join("a.json"), "json").await);
        assert!(!is_document_file(&temp.path().join("a.txt"), "json").await);
        assert!(!is_document_file(&temp.path().join("dir.json"), "json").await);
    }
}
