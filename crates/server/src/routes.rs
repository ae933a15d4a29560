//! Route configuration.

use crate::handlers;
use crate::metrics::{metrics_handler, register_metrics};
use crate::state::AppState;
use axum::Router;
use axum::http::header::{ACCEPT, CONTENT_TYPE, ORIGIN, USER_AGENT};
use axum::http::{HeaderName, HeaderValue, Method, request::Parts};
use axum::routing::get;
use lyrebird_core::config::ServerConfig;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route(
            "/",
            get(handlers::manage).post(handlers::translate_lyrics),
        )
        .route("/health", get(handlers::health_check));

    // Conditionally add metrics endpoint based on config.
    // See crate::metrics module documentation before exposing it.
    if state.config.server.metrics_enabled {
        register_metrics();
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router
        .layer(cors_layer(&state.config.server))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the player plugin.
///
/// Preflight requests are answered for any origin; actual requests only for the
/// configured origins. A `"*"` entry allows every origin.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::predicate(move |origin: &HeaderValue, parts: &Parts| {
            parts.method == Method::OPTIONS || origins.contains(origin)
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            USER_AGENT,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(CORS_MAX_AGE)
}
