//! Server test utilities.

use super::generator::FakeGenerator;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use lyrebird_core::config::AppConfig;
use lyrebird_core::{Identity, ManualClock};
use lyrebird_server::{AppState, Generator, create_router};
use lyrebird_storage::LyricsStore;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub generator: Arc<FakeGenerator>,
    pub clock: Arc<ManualClock>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server over a temporary cache root.
    pub fn new(generator: FakeGenerator) -> Self {
        Self::with_config(generator, |_| {})
    }

    /// Create a test server, adjusting the configuration first.
    pub fn with_config(generator: FakeGenerator, configure: impl FnOnce(&mut AppConfig)) -> Self {
        let generator = Arc::new(generator);
        let (temp_dir, config, clock) = test_config(configure);
        let store = LyricsStore::with_clock(&config.cache, clock.clone());
        let state = AppState::with_store(config, store, generator.clone());
        let router = create_router(state.clone());

        Self {
            router,
            state,
            generator,
            clock,
            _temp_dir: temp_dir,
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.state.config.cache.root
    }

    pub fn lock_path(&self, identity: &Identity) -> PathBuf {
        self.state.store.locks().lock_path(identity)
    }

    pub fn cache_path(&self, identity: &Identity) -> PathBuf {
        self.state.store.cache().cache_path(identity)
    }

    /// Move the clock forward by `secs` seconds.
    pub fn advance(&self, secs: i64) {
        self.clock.advance(time::Duration::seconds(secs));
    }

    /// Send a request and decode the JSON answer.
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        json_request(&self.router, method, uri, body).await
    }
}

/// Build a router around an arbitrary generator, for tests that need the real client.
#[allow(dead_code)]
pub fn router_with_generator(
    generator: Arc<dyn Generator>,
    configure: impl FnOnce(&mut AppConfig),
) -> (axum::Router, AppState, TempDir) {
    let (temp_dir, config, clock) = test_config(configure);
    let store = LyricsStore::with_clock(&config.cache, clock);
    let state = AppState::with_store(config, store, generator);
    (create_router(state.clone()), state, temp_dir)
}

fn test_config(configure: impl FnOnce(&mut AppConfig)) -> (TempDir, AppConfig, Arc<ManualClock>) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let mut config = AppConfig::for_testing(temp_dir.path().join("lyrics"));
    configure(&mut config);
    std::fs::create_dir_all(&config.cache.root).expect("Failed to create cache root");
    (temp_dir, config, Arc::new(ManualClock::new()))
}

/// Helper to make JSON requests.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}
