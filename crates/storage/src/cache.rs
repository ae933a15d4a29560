//! Durable, TTL-bounded result cache.
//!
//! Entries are JSON files written atomically with [`fs::write_atomic`]. Expiry is
//! evaluated on read from the file's modification time; expired files are left
//! in place and overwritten by the next successful translation.

use crate::error::StorageResult;
use crate::fs;
use lyrebird_core::{Clock, Identity, LyricsPayload, format_timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Cache files counted by [`CacheStore::stats`].
const TRANSLATION_FILE: &str = "translation.json";
const PHONETIC_FILE: &str = "phonetic.json";

/// A completed result as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(flatten)]
    pub payload: LyricsPayload,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub translated_at: String,
    #[serde(default)]
    pub is_phonetic: bool,
    #[serde(default)]
    pub provider: String,
    /// Set on entries returned by [`CacheStore::get`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    /// File modification time, set on entries returned by [`CacheStore::get`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_time: Option<String>,
}

/// Aggregate counts over the whole cache tree.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_artists: u64,
    pub total_songs: u64,
    pub total_translations: u64,
    pub total_phonetics: u64,
    pub cache_size_bytes: u64,
    pub cache_size_mb: f64,
}

/// Filesystem-backed result cache.
#[derive(Clone)]
pub struct CacheStore {
    root: PathBuf,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            ttl,
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_path(&self, identity: &Identity) -> PathBuf {
        identity.location(&self.root).cache_file
    }

    /// Look up a valid entry for `identity`.
    ///
    /// Missing, expired and unparseable files all read as `None`.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn get(&self, identity: &Identity) -> StorageResult<Option<CacheEntry>> {
        let path = self.cache_path(identity);

        let Some(modified) = fs::modified_at(&path).await? else {
            return Ok(None);
        };
        if self.clock.age_secs(modified) >= self.ttl.as_secs() {
            tracing::debug!(path = %path.display(), "Cache entry expired");
            return Ok(None);
        }
        // Removed between the stat and the read
        let Some(data) = fs::read_if_exists(&path).await? else {
            return Ok(None);
        };

        let mut entry = match serde_json::from_slice::<CacheEntry>(&data) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt cache file");
                return Ok(None);
            }
        };
        entry.cached = Some(true);
        entry.cache_time = Some(format_timestamp(modified));
        entry.provider = identity.provider.clone();

        tracing::info!(
            artist = %identity.artist,
            title = %identity.title,
            variant = %identity.variant,
            "Cache hit"
        );
        Ok(Some(entry))
    }

    /// Store `payload` for `identity`, replacing any prior entry.
    #[instrument(skip(self, payload), fields(identity = %identity))]
    pub async fn put(&self, identity: &Identity, payload: LyricsPayload) -> StorageResult<CacheEntry> {
        let entry = CacheEntry {
            payload,
            artist: identity.artist.clone(),
            title: identity.title.clone(),
            translated_at: format_timestamp(self.clock.now()),
            is_phonetic: identity.variant.is_phonetic(),
            provider: identity.provider.clone(),
            cached: None,
            cache_time: None,
        };
        let data = serde_json::to_vec_pretty(&entry)?;
        fs::write_atomic(&self.cache_path(identity), &data).await?;

        tracing::info!(
            artist = %identity.artist,
            title = %identity.title,
            variant = %identity.variant,
            provider = %identity.provider,
            "Cache entry saved"
        );
        Ok(entry)
    }

    /// Walk `root/<artist>/<song>/` once and count what is there.
    #[instrument(skip(self))]
    pub async fn stats(&self) -> StorageResult<CacheStats> {
        let mut stats = CacheStats::default();

        for artist_dir in visible_dirs(&self.root).await? {
            stats.total_artists += 1;
            for song_dir in visible_dirs(&artist_dir).await? {
                stats.total_songs += 1;
                for (name, counter) in [
                    (TRANSLATION_FILE, &mut stats.total_translations),
                    (PHONETIC_FILE, &mut stats.total_phonetics),
                ] {
                    if let Ok(meta) = tokio::fs::metadata(song_dir.join(name)).await
                        && meta.is_file()
                    {
                        *counter += 1;
                        stats.cache_size_bytes += meta.len();
                    }
                }
            }
        }

        stats.cache_size_mb =
            (stats.cache_size_bytes as f64 / BYTES_PER_MIB * 100.0).round() / 100.0;
        Ok(stats)
    }
}

/// Subdirectories of `dir` whose names do not start with a dot.
async fn visible_dirs(dir: &Path) -> StorageResult<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut dirs = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}
