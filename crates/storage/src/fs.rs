//! Filesystem primitives for the cache tree.
//!
//! Two guarantees carry the whole storage layer: cache files are replaced via
//! write-then-rename so readers never observe a partial file, and lock markers
//! are created with `O_CREAT | O_EXCL` so exactly one process wins a race.

use crate::error::{StorageError, StorageResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Infix of in-progress [`write_atomic`] files.
pub const TEMP_MARKER: &str = ".tmp.";

/// `path` with `suffix` appended to its file name.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}

/// Ensure parent directory exists.
async fn ensure_parent(path: &Path) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

/// Replace `path` with `data` atomically.
///
/// Writes to a uniquely named sibling, fsyncs, then renames over the target.
#[instrument(skip(data), fields(size = data.len()))]
pub async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    ensure_parent(path).await?;

    // Unique suffix keeps concurrent writers of the same entry apart
    let temp_path = sibling(path, &format!("{TEMP_MARKER}{}", Uuid::new_v4().simple()));

    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(StorageError::Io(e));
    }

    fs::rename(&temp_path, path).await?;
    Ok(())
}

/// Create `path` only if it does not exist yet, then write `data` into it.
///
/// Returns `false` when another writer got there first.
#[instrument(skip(data), fields(size = data.len()))]
pub async fn create_exclusive(path: &Path, data: &[u8]) -> StorageResult<bool> {
    ensure_parent(path).await?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(StorageError::Io(e)),
    };

    let written = async {
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        // A marker we cannot fill would block the identity until it goes stale
        let _ = fs::remove_file(path).await;
        return Err(StorageError::Io(e));
    }

    Ok(true)
}

/// Remove `path`, treating a missing file as success.
///
/// Returns whether a file was actually removed.
#[instrument]
pub async fn remove_if_exists(path: &Path) -> StorageResult<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Rename `from` to `to`. Returns `false` if `from` does not exist.
#[instrument]
pub async fn rename_if_exists(from: &Path, to: &Path) -> StorageResult<bool> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Hard-link `existing` at `path` unless `path` already exists.
///
/// Returns `false` when `path` was taken. Like [`create_exclusive`] this is a
/// single atomic step, so it can put a marker back without overwriting one.
#[instrument]
pub async fn link_if_absent(existing: &Path, path: &Path) -> StorageResult<bool> {
    match fs::hard_link(existing, path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Modification time of `path`, or `None` if it does not exist.
pub async fn modified_at(path: &Path) -> StorageResult<Option<OffsetDateTime>> {
    match fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.modified()?.into())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Contents of `path`, or `None` if it does not exist.
pub async fn read_if_exists(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Recursively collect regular files under `root` with the given extension.
///
/// Symlinks are skipped so the walk never leaves the cache tree.
pub async fn find_files(root: &Path, extension: &str) -> StorageResult<Vec<PathBuf>> {
    walk_files(root, |path| path.extension().is_some_and(|ext| ext == extension)).await
}

/// Recursively collect regular files under `root` accepted by `matches`.
pub async fn walk_files(
    root: &Path,
    matches: impl Fn(&Path) -> bool,
) -> StorageResult<Vec<PathBuf>> {
    let mut results = Vec::new();

    match fs::try_exists(root).await {
        Ok(true) => {}
        Ok(false) => return Ok(results),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(results),
        Err(e) => return Err(StorageError::Io(e)),
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Directory removed underneath us
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(StorageError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                stack.push(path);
            } else if file_type.is_file() && matches(&path) {
                results.push(path);
            }
        }
    }

    results.sort();
    Ok(results)
}
