use lyrebird_core::config::CacheConfig;
use lyrebird_core::{Identity, ManualClock, Variant};
use lyrebird_storage::LyricsStore;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// A store rooted in a fresh temp directory, driven by a manual clock.
pub struct TestStore {
    pub store: LyricsStore,
    pub clock: Arc<ManualClock>,
    dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let store = LyricsStore::with_clock(&config, clock.clone());
        Self {
            store,
            clock,
            dir,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.clock.advance(time::Duration::seconds(secs));
    }

    /// Leave the lock of a request that died `secs` seconds ago.
    #[allow(dead_code)]
    pub fn write_abandoned_lock(&self, identity: &Identity, secs: u64) {
        let record = serde_json::json!({
            "artist": identity.artist,
            "title": identity.title,
            "type": identity.variant.as_str(),
            "provider": identity.provider,
            "started_at": "2024-01-01 00:00:00",
            "request_id": "req_abandoned",
            "process_id": 1
        });
        self.write_raw_lock(identity, &serde_json::to_vec_pretty(&record).unwrap());
        backdate(&identity.location(self.root()).lock_file, secs);
    }

    /// Write raw bytes to the lock file of `identity`.
    pub fn write_raw_lock(&self, identity: &Identity, content: &[u8]) {
        let path = identity.location(self.root()).lock_file;
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

/// Set the modification time of `path` to `secs` seconds ago.
#[allow(dead_code)]
pub fn backdate(path: &Path, secs: u64) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() - Duration::from_secs(secs))
        .unwrap();
}

pub fn translation_identity() -> Identity {
    Identity::with_default_provider("IU", "Blueming", Variant::Translation)
}

pub fn phonetic_identity() -> Identity {
    Identity::with_default_provider("Aimer", "Kataomoi", Variant::Phonetic)
}
