//! Upstream text generation.
//!
//! The translation flow only needs raw model output for a song. [`Generator`]
//! is the seam: [`gemini::GeminiClient`] talks to the real API, tests plug in
//! canned responses.

pub mod gemini;
pub mod prompt;

pub use gemini::GeminiClient;
pub use prompt::build_prompt;

use async_trait::async_trait;
use lyrebird_core::Variant;
use thiserror::Error;

/// Upstream call failures. None of these are cached.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream response did not contain a result")]
    MalformedEnvelope,

    #[error("upstream client misconfigured: {0}")]
    Config(String),
}

impl UpstreamError {
    /// Map a non-success HTTP status to a user-facing message.
    pub fn from_status(status: u16) -> Self {
        let message = match status {
            401 => "Invalid API key. Check the Gemini API key",
            403 => "API access is forbidden. Check the API key permissions",
            429 => "Request quota exceeded. Try again later",
            500 | 502 | 503 => "Gemini service is temporarily unavailable. Try again later",
            _ => "Upstream API error",
        };
        Self::Http {
            status,
            message: message.to_string(),
        }
    }
}

/// Everything a generator needs to produce output for one song.
#[derive(Clone, Copy, Debug)]
pub struct GenerateRequest<'a> {
    pub artist: &'a str,
    pub title: &'a str,
    pub text: &'a str,
    pub variant: Variant,
}

impl GenerateRequest<'_> {
    /// Number of lines in the input lyrics, counting empty ones.
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }
}

/// Produces raw model output for a song.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, UpstreamError>;
}
