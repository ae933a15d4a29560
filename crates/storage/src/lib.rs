//! Filesystem-backed coordination for lyrebird.
//!
//! This crate provides:
//! - Atomic cache writes and exclusive lock creation ([`fs`])
//! - Per-identity in-flight locks with lazy stale expiry ([`lock`])
//! - A TTL-bounded result cache ([`cache`])
//! - Status and statistics views over both ([`status`])
//!
//! Nothing is held in memory between calls. The directory tree under the cache
//! root is the single source of truth, shared by every process pointed at it.

pub mod cache;
pub mod error;
pub mod fs;
pub mod lock;
pub mod status;

pub use cache::{CacheEntry, CacheStats, CacheStore};
pub use error::{StorageError, StorageResult};
pub use lock::{AcquireOutcome, LockGuard, LockInfo, LockManager, LockRecord, LockTicket};
pub use status::{GlobalStats, LockSummary, LyricsStore, TranslationStatus};
