//! Read-only views over the lock manager and cache store.

use crate::cache::{CacheEntry, CacheStats, CacheStore};
use crate::error::StorageResult;
use crate::lock::{LockManager, StaleRemoval, UNKNOWN_REQUEST_ID};
use lyrebird_core::config::CacheConfig;
use lyrebird_core::{Clock, Identity, SystemClock};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

const UNKNOWN: &str = "unknown";

/// Where a single identity stands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationStatus {
    Completed {
        cached_at: String,
    },
    InProgress {
        started_at: String,
        #[serde(rename = "duration")]
        duration_secs: u64,
        request_id: String,
    },
    /// The lock outlived the stale threshold; it has been removed.
    Failed {
        #[serde(rename = "duration")]
        duration_secs: u64,
    },
    NotFound,
}

impl TranslationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::InProgress { .. } => "in_progress",
            Self::Failed { .. } => "failed",
            Self::NotFound => "not_found",
        }
    }
}

/// One row of [`GlobalStats::locks`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockSummary {
    pub artist: String,
    pub title: String,
    #[serde(rename = "type")]
    pub variant: String,
    #[serde(rename = "duration")]
    pub duration_secs: u64,
    pub is_stale: bool,
}

/// Operator-facing snapshot of the whole store.
#[derive(Clone, Debug, Serialize)]
pub struct GlobalStats {
    pub active_translations: usize,
    pub cache_stats: CacheStats,
    pub locks: Vec<LockSummary>,
}

fn completed(entry: CacheEntry) -> TranslationStatus {
    TranslationStatus::Completed {
        cached_at: entry.cache_time.unwrap_or_else(|| UNKNOWN.to_string()),
    }
}

/// Cache store and lock manager sharing one root and one clock.
#[derive(Clone)]
pub struct LyricsStore {
    cache: CacheStore,
    locks: LockManager,
}

impl LyricsStore {
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: CacheStore::new(&config.root, config.ttl(), clock.clone()),
            locks: LockManager::new(&config.root, config.lock_stale_after(), clock),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    /// Report the state of `identity`, removing its lock if it has gone stale.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn status(&self, identity: &Identity) -> StorageResult<TranslationStatus> {
        if let Some(entry) = self.cache.get(identity).await? {
            return Ok(completed(entry));
        }

        let Some(mut lock) = self.locks.inspect(identity).await? else {
            return Ok(TranslationStatus::NotFound);
        };

        if lock.is_stale {
            match self.locks.remove_stale(&lock.path).await? {
                StaleRemoval::Removed(stale) => {
                    tracing::warn!(
                        artist = %identity.artist,
                        title = %identity.title,
                        duration_secs = stale.age_secs,
                        "Translation timed out, stale lock removed"
                    );
                    return Ok(TranslationStatus::Failed {
                        duration_secs: stale.age_secs,
                    });
                }
                // Another caller is removing it
                StaleRemoval::Busy => {
                    return Ok(TranslationStatus::Failed {
                        duration_secs: lock.age_secs,
                    });
                }
                StaleRemoval::NotStale(Some(live)) => lock = live,
                // Released since we looked, possibly after caching a result
                StaleRemoval::NotStale(None) => {
                    return Ok(match self.cache.get(identity).await? {
                        Some(entry) => completed(entry),
                        None => TranslationStatus::NotFound,
                    });
                }
            }
        }

        let (started_at, request_id) = match lock.record {
            Some(record) => (record.started_at, record.request_id),
            None => (lock.created_at, UNKNOWN_REQUEST_ID.to_string()),
        };
        Ok(TranslationStatus::InProgress {
            started_at,
            duration_secs: lock.age_secs,
            request_id,
        })
    }

    /// Active locks plus cache counts.
    #[instrument(skip(self))]
    pub async fn global_stats(&self) -> StorageResult<GlobalStats> {
        let locks = self.locks.list_active().await?;
        let cache_stats = self.cache.stats().await?;

        let locks: Vec<LockSummary> = locks
            .into_iter()
            .map(|lock| match lock.record {
                Some(record) => LockSummary {
                    artist: record.artist,
                    title: record.title,
                    variant: record.variant.to_string(),
                    duration_secs: lock.age_secs,
                    is_stale: lock.is_stale,
                },
                None => LockSummary {
                    artist: UNKNOWN.to_string(),
                    title: UNKNOWN.to_string(),
                    variant: UNKNOWN.to_string(),
                    duration_secs: lock.age_secs,
                    is_stale: lock.is_stale,
                },
            })
            .collect();

        Ok(GlobalStats {
            active_translations: locks.len(),
            cache_stats,
            locks,
        })
    }
}
