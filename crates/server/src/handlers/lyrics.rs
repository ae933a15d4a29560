//! Translation endpoint.

use crate::error::ApiResult;
use crate::state::AppState;
use crate::translate::{TranslateOutcome, TranslateRequest, handle_translate_request};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lyrebird_core::{LyricsPayload, Variant};
use serde::{Deserialize, Serialize};

/// Translation request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateBody {
    pub artist: String,
    pub title: String,
    pub text: String,
    /// Request a romanization instead of a translation.
    #[serde(default)]
    pub want_smart_phonetic: Option<bool>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl From<TranslateBody> for TranslateRequest {
    fn from(body: TranslateBody) -> Self {
        Self {
            artist: body.artist,
            title: body.title,
            text: body.text,
            variant: Variant::from_phonetic_flag(body.want_smart_phonetic.unwrap_or(false)),
            provider: body.provider,
        }
    }
}

/// Body of a 202 answer while another request generates the same result.
#[derive(Debug, Serialize)]
pub struct InProgressResponse {
    pub error: bool,
    pub message: &'static str,
    pub status: &'static str,
    pub started_at: String,
    pub request_id: String,
    /// Seconds the client should wait before polling again.
    pub retry_after: u64,
    pub artist: String,
    pub title: String,
    #[serde(rename = "type")]
    pub variant: Variant,
    pub provider: String,
}

/// Body of a freshly generated result.
#[derive(Debug, Serialize)]
pub struct FreshResponse {
    #[serde(flatten)]
    pub payload: LyricsPayload,
    pub cached: bool,
    pub request_id: String,
}

/// POST / - Translate or romanize lyrics.
pub async fn translate_lyrics(
    State(state): State<AppState>,
    Json(body): Json<TranslateBody>,
) -> ApiResult<Response> {
    let translation = handle_translate_request(&state, body.into()).await?;
    let identity = translation.identity;

    let response = match translation.outcome {
        TranslateOutcome::Cached(entry) => (StatusCode::OK, Json(entry)).into_response(),
        TranslateOutcome::Fresh {
            payload,
            request_id,
        } => (
            StatusCode::OK,
            Json(FreshResponse {
                payload,
                cached: false,
                request_id,
            }),
        )
            .into_response(),
        TranslateOutcome::InProgress(ticket) => (
            StatusCode::ACCEPTED,
            Json(InProgressResponse {
                error: false,
                message: "This song is already being translated. Please try again shortly.",
                status: "translation_in_progress",
                started_at: ticket.started_at,
                request_id: ticket.request_id,
                retry_after: state.config.server.retry_after_secs,
                artist: identity.artist,
                title: identity.title,
                variant: identity.variant,
                provider: identity.provider,
            }),
        )
            .into_response(),
    };
    Ok(response)
}
