//! Application state shared across handlers.

use crate::upstream::Generator;
use lyrebird_core::config::AppConfig;
use lyrebird_storage::LyricsStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Cache and lock storage.
    pub store: Arc<LyricsStore>,
    /// Upstream text generator.
    pub generator: Arc<dyn Generator>,
}

impl AppState {
    /// Create a new application state with a store built from `config.cache`.
    pub fn new(config: AppConfig, generator: Arc<dyn Generator>) -> Self {
        let store = LyricsStore::from_config(&config.cache);
        Self::with_store(config, store, generator)
    }

    /// Create a new application state around an existing store.
    pub fn with_store(config: AppConfig, store: LyricsStore, generator: Arc<dyn Generator>) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            generator,
        }
    }
}
