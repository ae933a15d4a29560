//! In-flight request locks.
//!
//! A lock is a marker file next to the cache entry it protects. Its existence is
//! the "held" state; its JSON content is informational only. There is no
//! in-memory lock table: every decision re-reads the filesystem, so several
//! server processes sharing one cache root coordinate through
//! create-exclusive and unlink alone.
//!
//! Expiry is lazy. A marker older than the stale threshold is removed by
//! whichever caller next looks at it, so a crashed holder never blocks an
//! identity forever. Removal goes through [`LockManager::remove_stale`]: one
//! reclaimer at a time per marker (a sibling `.reclaim` file), a re-check under
//! it, and a rename aside before unlinking, so a caller acting on an old
//! observation never deletes a successor's marker.

use crate::error::StorageResult;
use crate::fs;
use lyrebird_core::{Clock, Identity, Variant, format_timestamp};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;

/// Reported when a held lock's content cannot be read.
pub const UNKNOWN_REQUEST_ID: &str = "unknown";

/// Suffix of the marker serializing stale reclaims of one lock.
const RECLAIM_SUFFIX: &str = ".reclaim";

/// Infix of a stale marker moved aside before deletion.
pub const TOMBSTONE_MARKER: &str = ".stale.";

/// Content of a lock marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub artist: String,
    pub title: String,
    #[serde(rename = "type")]
    pub variant: Variant,
    pub provider: String,
    pub started_at: String,
    pub request_id: String,
    pub process_id: u32,
}

/// Request id and start time of a lock, as reported to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LockTicket {
    pub request_id: String,
    pub started_at: String,
}

/// Result of [`LockManager::try_acquire`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The caller now owns the lock.
    Acquired(LockTicket),
    /// Another request holds the lock.
    Held(LockTicket),
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }

    pub fn ticket(&self) -> &LockTicket {
        match self {
            Self::Acquired(ticket) | Self::Held(ticket) => ticket,
        }
    }
}

/// Observed state of one lock marker.
#[derive(Clone, Debug, Serialize)]
pub struct LockInfo {
    #[serde(rename = "file_path")]
    pub path: PathBuf,
    /// `None` when the marker's content is missing or unparseable.
    #[serde(rename = "data")]
    pub record: Option<LockRecord>,
    /// Marker modification time.
    pub created_at: String,
    #[serde(rename = "duration")]
    pub age_secs: u64,
    pub is_stale: bool,
}

impl LockInfo {
    fn ticket(&self) -> LockTicket {
        match &self.record {
            Some(record) => LockTicket {
                request_id: record.request_id.clone(),
                started_at: record.started_at.clone(),
            },
            None => LockTicket {
                request_id: UNKNOWN_REQUEST_ID.to_string(),
                started_at: self.created_at.clone(),
            },
        }
    }
}

/// Result of [`LockManager::remove_stale`].
#[derive(Debug)]
pub(crate) enum StaleRemoval {
    /// The stale marker was removed.
    Removed(LockInfo),
    /// By the time the reclaim ran the marker was live, or gone.
    NotStale(Option<LockInfo>),
    /// Another caller is reclaiming this marker.
    Busy,
}

/// Removes the reclaim marker when the reclaim ends or is cancelled.
struct ReclaimGuard {
    path: PathBuf,
}

impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Filesystem-backed lock manager.
#[derive(Clone)]
pub struct LockManager {
    root: PathBuf,
    stale_after: Duration,
    clock: Arc<dyn Clock>,
}

impl LockManager {
    pub fn new(root: impl Into<PathBuf>, stale_after: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            stale_after,
            clock,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn lock_path(&self, identity: &Identity) -> PathBuf {
        identity.location(&self.root).lock_file
    }

    fn is_stale(&self, age_secs: u64) -> bool {
        age_secs > self.stale_after.as_secs()
    }

    /// Read the marker at `path`, if any.
    async fn read_info(&self, path: &Path) -> StorageResult<Option<LockInfo>> {
        let Some(modified) = fs::modified_at(path).await? else {
            return Ok(None);
        };
        let record = fs::read_if_exists(path)
            .await?
            .and_then(|data| serde_json::from_slice::<LockRecord>(&data).ok());
        let age_secs = self.clock.age_secs(modified);

        Ok(Some(LockInfo {
            path: path.to_path_buf(),
            record,
            created_at: format_timestamp(modified),
            age_secs,
            is_stale: self.is_stale(age_secs),
        }))
    }

    /// Inspect the lock for `identity` without changing it.
    pub async fn inspect(&self, identity: &Identity) -> StorageResult<Option<LockInfo>> {
        self.read_info(&self.lock_path(identity)).await
    }

    /// Try to claim `identity`.
    ///
    /// A stale marker is removed first. A live marker is reported as
    /// [`AcquireOutcome::Held`] even when its content is unreadable.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn try_acquire(&self, identity: &Identity) -> StorageResult<AcquireOutcome> {
        let path = self.lock_path(identity);

        if let Some(existing) = self.read_info(&path).await? {
            if !existing.is_stale {
                return Ok(AcquireOutcome::Held(existing.ticket()));
            }
            match self.remove_stale(&path).await? {
                StaleRemoval::Removed(stale) => {
                    tracing::warn!(
                        artist = %identity.artist,
                        title = %identity.title,
                        age_secs = stale.age_secs,
                        "Stale lock file removed"
                    );
                }
                StaleRemoval::NotStale(Some(live)) => {
                    return Ok(AcquireOutcome::Held(live.ticket()));
                }
                // Released since we looked
                StaleRemoval::NotStale(None) => {}
                StaleRemoval::Busy => {
                    let ticket = match self.read_info(&path).await? {
                        Some(current) => current.ticket(),
                        None => existing.ticket(),
                    };
                    return Ok(AcquireOutcome::Held(ticket));
                }
            }
        }

        let record = LockRecord {
            artist: identity.artist.clone(),
            title: identity.title.clone(),
            variant: identity.variant,
            provider: identity.provider.clone(),
            started_at: format_timestamp(self.clock.now()),
            request_id: new_request_id(),
            process_id: std::process::id(),
        };
        let data = serde_json::to_vec_pretty(&record)?;

        if fs::create_exclusive(&path, &data).await? {
            tracing::debug!(request_id = %record.request_id, "Lock acquired");
            return Ok(AcquireOutcome::Acquired(LockTicket {
                request_id: record.request_id,
                started_at: record.started_at,
            }));
        }

        // Lost the race to a concurrent acquirer
        let ticket = match self.read_info(&path).await? {
            Some(winner) => winner.ticket(),
            None => LockTicket {
                request_id: UNKNOWN_REQUEST_ID.to_string(),
                started_at: format_timestamp(self.clock.now()),
            },
        };
        Ok(AcquireOutcome::Held(ticket))
    }

    /// Remove the lock for `identity`. Returns `false` if there was none.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn release(&self, identity: &Identity) -> StorageResult<bool> {
        let removed = fs::remove_if_exists(&self.lock_path(identity)).await?;
        if removed {
            tracing::info!(
                artist = %identity.artist,
                title = %identity.title,
                "Lock released"
            );
        }
        Ok(removed)
    }

    /// Create a guard that releases the lock for `identity` when dropped.
    ///
    /// Call right after [`AcquireOutcome::Acquired`], with no `.await` in between.
    pub fn guard(&self, identity: &Identity, ticket: &LockTicket) -> LockGuard {
        LockGuard {
            path: self.lock_path(identity),
            request_id: ticket.request_id.clone(),
            armed: true,
        }
    }

    /// Every lock marker under the root, stale or not.
    #[instrument(skip(self))]
    pub async fn list_active(&self) -> StorageResult<Vec<LockInfo>> {
        let mut locks = Vec::new();
        for path in fs::find_files(&self.root, "lock").await? {
            // Released between the walk and the read
            if let Some(info) = self.read_info(&path).await? {
                locks.push(info);
            }
        }
        Ok(locks)
    }

    /// Remove every stale marker. Returns how many were removed.
    ///
    /// Temp files of interrupted cache writes and tombstones of interrupted
    /// reclaims are removed too once they are older than the stale threshold.
    #[instrument(skip(self))]
    pub async fn sweep_stale(&self) -> StorageResult<usize> {
        let mut cleaned = 0;
        for lock in self.list_active().await? {
            if !lock.is_stale {
                continue;
            }
            if let StaleRemoval::Removed(removed) = self.remove_stale(&lock.path).await? {
                cleaned += 1;
                let (artist, title) = removed
                    .record
                    .as_ref()
                    .map(|r| (r.artist.as_str(), r.title.as_str()))
                    .unwrap_or((UNKNOWN_REQUEST_ID, UNKNOWN_REQUEST_ID));
                tracing::info!(
                    artist = %artist,
                    title = %title,
                    duration_secs = removed.age_secs,
                    "Cleaned stale lock"
                );
            }
        }

        let leftovers = self.sweep_leftovers().await?;
        if leftovers > 0 {
            tracing::info!(count = leftovers, "Removed leftover temporary files");
        }
        Ok(cleaned)
    }

    /// Remove the marker at `path` if it is still stale.
    ///
    /// Reclaims of one marker are serialized by a sibling `.reclaim` file. The
    /// marker is re-read under it, then renamed to a unique tombstone before it
    /// is deleted. If the file that was moved turns out to be live (its holder
    /// released and another request acquired in between) it is linked back.
    pub(crate) async fn remove_stale(&self, path: &Path) -> StorageResult<StaleRemoval> {
        let Some(_reclaim) = self.claim_reclaim(path).await? else {
            return Ok(StaleRemoval::Busy);
        };

        let Some(info) = self.read_info(path).await? else {
            return Ok(StaleRemoval::NotStale(None));
        };
        if !info.is_stale {
            return Ok(StaleRemoval::NotStale(Some(info)));
        }

        let tombstone = fs::sibling(
            path,
            &format!("{TOMBSTONE_MARKER}{}", Uuid::new_v4().simple()),
        );
        if !fs::rename_if_exists(path, &tombstone).await? {
            return Ok(StaleRemoval::NotStale(None));
        }

        let moved = self.read_info(&tombstone).await?;
        let outcome = match moved {
            Some(moved) if !moved.is_stale => {
                if !fs::link_if_absent(&tombstone, path).await? {
                    tracing::warn!(
                        path = %path.display(),
                        "Live lock was replaced while it was moved aside"
                    );
                }
                StaleRemoval::NotStale(Some(LockInfo {
                    path: path.to_path_buf(),
                    ..moved
                }))
            }
            _ => StaleRemoval::Removed(info),
        };
        fs::remove_if_exists(&tombstone).await?;
        Ok(outcome)
    }

    /// Take the reclaim marker of `path`, breaking one left by a crashed reclaimer.
    async fn claim_reclaim(&self, path: &Path) -> StorageResult<Option<ReclaimGuard>> {
        let reclaim = fs::sibling(path, RECLAIM_SUFFIX);
        let owner = std::process::id().to_string();

        if fs::create_exclusive(&reclaim, owner.as_bytes()).await? {
            return Ok(Some(ReclaimGuard { path: reclaim }));
        }
        if let Some(modified) = fs::modified_at(&reclaim).await?
            && self.is_stale(self.clock.age_secs(modified))
        {
            fs::remove_if_exists(&reclaim).await?;
            if fs::create_exclusive(&reclaim, owner.as_bytes()).await? {
                return Ok(Some(ReclaimGuard { path: reclaim }));
            }
        }
        Ok(None)
    }

    /// Remove old `write_atomic` temp files and reclaim tombstones.
    async fn sweep_leftovers(&self) -> StorageResult<usize> {
        let candidates = fs::walk_files(&self.root, |path| {
            path.file_name().is_some_and(|name| {
                let name = name.to_string_lossy();
                has_unique_suffix(&name, fs::TEMP_MARKER)
                    || has_unique_suffix(&name, TOMBSTONE_MARKER)
            })
        })
        .await?;

        let mut removed = 0;
        for path in candidates {
            let Some(modified) = fs::modified_at(&path).await? else {
                continue;
            };
            if self.is_stale(self.clock.age_secs(modified))
                && fs::remove_if_exists(&path).await?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Whether `name` ends in `marker` followed by a simple-form UUID.
fn has_unique_suffix(name: &str, marker: &str) -> bool {
    name.rsplit_once(marker)
        .is_some_and(|(_, tail)| tail.len() == 32 && tail.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Releases a held lock on every exit path.
///
/// Call [`LockGuard::release`] on the normal path. If the guard is dropped while
/// still armed (an error, a panic, or the request future being cancelled when
/// the client disconnects) the marker is removed synchronously in `Drop`.
///
/// The guard only removes a marker whose recorded request id is its own, or
/// whose content is unreadable, so it never deletes a lock that was reclaimed
/// by another request after going stale.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    request_id: String,
    armed: bool,
}

impl LockGuard {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Release the lock. Returns whether a marker was removed.
    pub async fn release(mut self) -> StorageResult<bool> {
        self.armed = false;
        let owned = match fs::read_if_exists(&self.path).await? {
            None => return Ok(false),
            Some(data) => self.owns(&data),
        };
        if !owned {
            tracing::warn!(
                request_id = %self.request_id,
                path = %self.path.display(),
                "Lock was reclaimed by another request, leaving it in place"
            );
            return Ok(false);
        }
        fs::remove_if_exists(&self.path).await
    }

    fn owns(&self, data: &[u8]) -> bool {
        match serde_json::from_slice::<LockRecord>(data) {
            Ok(record) => record.request_id == self.request_id,
            Err(_) => true,
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Best-effort: never panic in Drop.
        let owned = std::fs::read(&self.path)
            .map(|data| self.owns(&data))
            .unwrap_or(false);
        if owned && std::fs::remove_file(&self.path).is_ok() {
            tracing::info!(
                request_id = %self.request_id,
                "Lock released by guard after an interrupted request"
            );
        }
    }
}

/// Generate a request identifier of the form `req_<32 hex chars>`.
pub fn new_request_id() -> String {
    format!("req_{}", Uuid::new_v4().simple())
}
