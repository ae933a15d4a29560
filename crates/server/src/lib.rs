//! HTTP translation proxy for lyrebird.
//!
//! This crate provides:
//! - The translation flow over the cache and lock store
//! - The Gemini upstream client and its prompts
//! - Status, lock listing, cleanup and statistics endpoints
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod translate;
pub mod upstream;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
pub use translate::{TranslateOutcome, TranslateRequest, handle_translate_request};
pub use upstream::{GenerateRequest, Generator, UpstreamError};
