//! Status and maintenance actions on `GET /`.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use lyrebird_core::{Identity, Variant};
use lyrebird_storage::{LockInfo, TranslationStatus};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Query parameters for `GET /`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementParams {
    pub action: Option<String>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub want_smart_phonetic: Option<bool>,
    pub provider: Option<String>,
}

/// Status of one identity.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub status: TranslationStatus,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl From<TranslationStatus> for StatusResponse {
    fn from(status: TranslationStatus) -> Self {
        let (message, cached) = match &status {
            TranslationStatus::Completed { .. } => ("Translation completed", Some(true)),
            TranslationStatus::InProgress { .. } => ("Translation in progress", None),
            TranslationStatus::Failed { .. } => {
                ("Translation timed out. Please try again.", None)
            }
            TranslationStatus::NotFound => ("Translation not found", None),
        };
        Self {
            status,
            message,
            cached,
        }
    }
}

/// Every lock marker in the cache tree.
#[derive(Debug, Serialize)]
pub struct LocksResponse {
    pub total_locks: usize,
    pub locks: Vec<LockInfo>,
}

/// Result of a stale-lock sweep.
#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub message: String,
    pub cleaned_count: usize,
}

/// GET / - Dispatch on `action`; without one, describe the API.
pub async fn manage(
    State(state): State<AppState>,
    Query(params): Query<ManagementParams>,
) -> ApiResult<Response> {
    let response = match params.action.as_deref() {
        Some("status") => Json(translation_status(&state, &params).await?).into_response(),
        Some("locks") => {
            let locks = state.store.locks().list_active().await?;
            Json(LocksResponse {
                total_locks: locks.len(),
                locks,
            })
            .into_response()
        }
        Some("cleanup") => {
            let cleaned = state.store.locks().sweep_stale().await?;
            metrics::STALE_LOCKS_REMOVED.inc_by(cleaned as u64);
            Json(CleanupResponse {
                message: format!("Cleaned up {cleaned} stale lock file(s)"),
                cleaned_count: cleaned,
            })
            .into_response()
        }
        Some("stats") => Json(state.store.global_stats().await?).into_response(),
        _ => Json(api_info(&state)).into_response(),
    };
    Ok(response)
}

async fn translation_status(
    state: &AppState,
    params: &ManagementParams,
) -> ApiResult<StatusResponse> {
    let (Some(artist), Some(title)) = (
        params.artist.as_deref().map(str::trim).filter(|a| !a.is_empty()),
        params.title.as_deref().map(str::trim).filter(|t| !t.is_empty()),
    ) else {
        return Err(ApiError::BadRequest(
            "artist and title parameters are required".to_string(),
        ));
    };

    let identity = Identity::new(
        artist,
        title,
        Variant::from_phonetic_flag(params.want_smart_phonetic.unwrap_or(false)),
        Identity::resolve_provider(params.provider.as_deref()),
    );
    let status = state.store.status(&identity).await?;
    if matches!(status, TranslationStatus::Failed { .. }) {
        metrics::STALE_LOCKS_REMOVED.inc();
    }
    Ok(status.into())
}

fn api_info(state: &AppState) -> serde_json::Value {
    let stale_minutes = state.config.cache.lock_stale_secs / 60;
    json!({
        "message": "Lyrics Translation API with Duplicate Prevention",
        "version": env!("CARGO_PKG_VERSION"),
        "available_actions": {
            "POST /": "Request a translation",
            "GET /?action=status&artist=...&title=...": "Check translation status",
            "GET /?action=locks": "List active locks",
            "GET /?action=cleanup": "Remove stale locks",
            "GET /?action=stats": "System statistics"
        },
        "features": {
            "duplicate_prevention": true,
            "caching": true,
            "lock_timeout": format!("{stale_minutes} minutes"),
            "supported_types": [Variant::Translation, Variant::Phonetic]
        }
    })
}
