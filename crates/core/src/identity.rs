//! Song identities and their storage locations.
//!
//! An [`Identity`] names one translatable unit: an artist, a title, the kind of
//! output requested, and the lyrics provider the client fetched from. Its
//! storage location is `root/<artist>/<title>/<variant>[_<provider>].{json,lock}`
//! with every user-supplied segment passed through [`sanitize_segment`].
//!
//! Sanitization is lossy. Two raw strings that sanitize to the same segment
//! (for example `"Song"` and `"Song\u{7}"`) share one cache entry and one lock.

use crate::{DEFAULT_PROVIDER, MAX_SEGMENT_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Characters that are never allowed in a path segment.
const RESERVED_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Kind of output requested for a song.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    /// Target-language rendering of the lyrics.
    Translation,
    /// Romanization of the source script.
    Phonetic,
}

impl Variant {
    pub fn from_phonetic_flag(want_phonetic: bool) -> Self {
        if want_phonetic {
            Self::Phonetic
        } else {
            Self::Translation
        }
    }

    pub fn is_phonetic(self) -> bool {
        matches!(self, Self::Phonetic)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Phonetic => "phonetic",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(artist, title, variant, provider)` tuple identifying one cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Identity {
    pub artist: String,
    pub title: String,
    pub variant: Variant,
    pub provider: String,
}

impl Identity {
    pub fn new(
        artist: impl Into<String>,
        title: impl Into<String>,
        variant: Variant,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            variant,
            provider: provider.into(),
        }
    }

    /// Identity for the default provider.
    pub fn with_default_provider(
        artist: impl Into<String>,
        title: impl Into<String>,
        variant: Variant,
    ) -> Self {
        Self::new(artist, title, variant, DEFAULT_PROVIDER)
    }

    /// Provider named by a client, trimmed. Absent or blank means the default.
    pub fn resolve_provider(provider: Option<&str>) -> &str {
        provider
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROVIDER)
    }

    /// Directory holding every variant of this song, relative to the cache root.
    pub fn song_dir(&self) -> PathBuf {
        PathBuf::from(sanitize_segment(&self.artist)).join(sanitize_segment(&self.title))
    }

    /// Filename stem shared by the cache and lock files.
    fn file_stem(&self) -> String {
        if self.provider == DEFAULT_PROVIDER {
            self.variant.as_str().to_string()
        } else {
            format!(
                "{}_{}",
                self.variant.as_str(),
                sanitize_segment(&self.provider)
            )
        }
    }

    /// Resolve the on-disk location of this identity under `root`.
    ///
    /// Pure path arithmetic: nothing is created or checked.
    pub fn location(&self, root: &Path) -> StorageLocation {
        let dir = root.join(self.song_dir());
        let stem = self.file_stem();
        StorageLocation {
            cache_file: dir.join(format!("{stem}.json")),
            lock_file: dir.join(format!("{stem}.lock")),
            dir,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({}, {})",
            self.artist, self.title, self.variant, self.provider
        )
    }
}

/// Resolved paths for one identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageLocation {
    /// `root/<artist>/<title>`
    pub dir: PathBuf,
    /// Completed result.
    pub cache_file: PathBuf,
    /// In-flight marker.
    pub lock_file: PathBuf,
}

/// Turn an arbitrary string into a filesystem-safe path segment.
///
/// Removes reserved characters and ASCII control characters, replaces spaces
/// with underscores, and truncates to [`MAX_SEGMENT_LEN`] characters. Never
/// fails; the result may be empty.
pub fn sanitize_segment(raw: &str) -> String {
    raw.chars()
        .filter(|c| !RESERVED_CHARS.contains(c) && (*c as u32) >= 0x20)
        .map(|c| if c == ' ' { '_' } else { c })
        .take(MAX_SEGMENT_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_reserved_and_control_chars() {
        assert_eq!(sanitize_segment("AC/DC"), "ACDC");
        assert_eq!(sanitize_segment("What?*<>|\"\\:"), "What");
        assert_eq!(sanitize_segment("tab\there\n"), "tabhere");
    }

    #[test]
    fn sanitize_replaces_spaces() {
        assert_eq!(sanitize_segment("Bohemian Rhapsody"), "Bohemian_Rhapsody");
        assert_eq!(sanitize_segment("  "), "__");
    }

    #[test]
    fn sanitize_truncates_by_chars() {
        let long = "가".repeat(250);
        let sanitized = sanitize_segment(&long);
        assert_eq!(sanitized.chars().count(), MAX_SEGMENT_LEN);
    }

    #[test]
    fn sanitize_accepts_empty() {
        assert_eq!(sanitize_segment(""), "");
        assert_eq!(sanitize_segment("///"), "");
    }

    #[test]
    fn default_provider_uses_unsuffixed_names() {
        let root = Path::new("/cache");
        let id = Identity::with_default_provider("IU", "Blueming", Variant::Translation);
        let loc = id.location(root);
        assert_eq!(loc.dir, Path::new("/cache/IU/Blueming"));
        assert_eq!(loc.cache_file, Path::new("/cache/IU/Blueming/translation.json"));
        assert_eq!(loc.lock_file, Path::new("/cache/IU/Blueming/translation.lock"));

        let phonetic = Identity::with_default_provider("IU", "Blueming", Variant::Phonetic);
        let loc = phonetic.location(root);
        assert_eq!(loc.cache_file, Path::new("/cache/IU/Blueming/phonetic.json"));
        assert_eq!(loc.lock_file, Path::new("/cache/IU/Blueming/phonetic.lock"));
    }

    #[test]
    fn other_providers_are_suffixed() {
        let id = Identity::new("YOASOBI", "Idol", Variant::Phonetic, "Apple Music");
        let loc = id.location(Path::new("/c"));
        assert_eq!(loc.cache_file, Path::new("/c/YOASOBI/Idol/phonetic_Apple_Music.json"));
        assert_eq!(loc.lock_file, Path::new("/c/YOASOBI/Idol/phonetic_Apple_Music.lock"));
    }

    #[test]
    fn blank_provider_resolves_to_default() {
        assert_eq!(Identity::resolve_provider(None), DEFAULT_PROVIDER);
        assert_eq!(Identity::resolve_provider(Some("")), DEFAULT_PROVIDER);
        assert_eq!(Identity::resolve_provider(Some("  ")), DEFAULT_PROVIDER);
        assert_eq!(Identity::resolve_provider(Some(" Apple Music ")), "Apple Music");
    }

    #[test]
    fn near_identical_identities_collide() {
        let root = Path::new("/c");
        let a = Identity::with_default_provider("Artist", "Song", Variant::Translation);
        let b = Identity::with_default_provider("Artist", "Song\u{7}", Variant::Translation);
        assert_ne!(a, b);
        assert_eq!(a.location(root), b.location(root));
    }

    #[test]
    fn variant_flag_roundtrip() {
        assert_eq!(Variant::from_phonetic_flag(true), Variant::Phonetic);
        assert_eq!(Variant::from_phonetic_flag(false), Variant::Translation);
        assert!(Variant::Phonetic.is_phonetic());
        assert_eq!(Variant::Translation.to_string(), "translation");
    }
}
