//! Core domain types and shared logic for the lyrebird lyrics proxy.
//!
//! This crate defines the pieces every other crate builds on:
//! - Song identities and their on-disk locations
//! - The translated/phonetic payload model
//! - Tolerant extraction of payloads from generative model output
//! - Clock abstraction for age and TTL computations
//! - Configuration types

pub mod clock;
pub mod config;
pub mod error;
pub mod extract;
pub mod identity;
pub mod payload;

pub use clock::{Clock, ManualClock, SystemClock, format_timestamp};
pub use error::{Error, Result};
pub use extract::{Extraction, ExtractionTier, extract, extract_payload};
pub use identity::{Identity, StorageLocation, Variant, sanitize_segment};
pub use payload::{FieldValue, LyricsPayload};

/// Provider name that maps to unsuffixed cache and lock filenames.
pub const DEFAULT_PROVIDER: &str = "Spotify";

/// Age after which an in-flight lock is considered abandoned: 30 minutes.
pub const LOCK_STALE_SECS: u64 = 30 * 60;

/// Lifetime of a cache entry: 30 days.
pub const CACHE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Maximum accepted lyrics length, in characters.
pub const MAX_LYRICS_LENGTH: usize = 10_000;

/// Maximum length of a sanitized path segment, in characters.
pub const MAX_SEGMENT_LEN: usize = 200;
