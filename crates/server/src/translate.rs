//! Translation flow: cache, lock, generate, extract, store.
//!
//! A request for an identity is answered from the cache when possible. On a
//! miss the caller tries to take the identity's lock; losing means another
//! request is already generating the same result and the caller gets an
//! in-progress notice to poll with. The winner calls the generator, extracts a
//! payload from its output, caches it, and releases the lock.
//!
//! The lock is released on every exit path. Errors release it explicitly before
//! returning, and a [`lyrebird_storage::LockGuard`] removes it if the request
//! future is dropped mid-flight (client disconnect).

use crate::error::ApiResult;
use crate::metrics;
use crate::state::AppState;
use crate::upstream::GenerateRequest;
use lyrebird_core::{Identity, LyricsPayload, Variant, extract_payload};
use lyrebird_storage::{AcquireOutcome, CacheEntry, LockTicket};
use std::time::Instant;

/// A translation request as received from a client.
#[derive(Clone, Debug)]
pub struct TranslateRequest {
    pub artist: String,
    pub title: String,
    pub text: String,
    pub variant: Variant,
    pub provider: Option<String>,
}

impl TranslateRequest {
    /// Trim and check the request, producing the identity and lyrics to work on.
    pub fn validate(&self, max_lyrics_length: usize) -> lyrebird_core::Result<(Identity, String)> {
        let artist = self.artist.trim();
        let title = self.title.trim();
        let text = self.text.trim();

        if artist.is_empty() {
            return Err(lyrebird_core::Error::EmptyField("artist"));
        }
        if title.is_empty() {
            return Err(lyrebird_core::Error::EmptyField("title"));
        }
        if text.is_empty() {
            return Err(lyrebird_core::Error::EmptyField("text"));
        }

        let length = text.chars().count();
        if length > max_lyrics_length {
            return Err(lyrebird_core::Error::TextTooLong {
                length,
                max: max_lyrics_length,
            });
        }

        let provider = Identity::resolve_provider(self.provider.as_deref());

        Ok((
            Identity::new(artist, title, self.variant, provider),
            text.to_string(),
        ))
    }
}

/// How a translation request was answered.
#[derive(Clone, Debug)]
pub enum TranslateOutcome {
    /// Served from the cache.
    Cached(CacheEntry),
    /// Generated by this request and now cached.
    Fresh {
        payload: LyricsPayload,
        request_id: String,
    },
    /// Another request holds the lock.
    InProgress(LockTicket),
}

/// Result of [`handle_translate_request`], with the identity it resolved to.
#[derive(Clone, Debug)]
pub struct Translation {
    pub identity: Identity,
    pub outcome: TranslateOutcome,
}

/// Answer a translation request.
pub async fn handle_translate_request(
    state: &AppState,
    request: TranslateRequest,
) -> ApiResult<Translation> {
    let (identity, text) = request.validate(state.config.server.max_lyrics_length)?;
    let store = &state.store;

    tracing::info!(
        artist = %identity.artist,
        title = %identity.title,
        variant = %identity.variant,
        provider = %identity.provider,
        "Translation requested"
    );

    if let Some(entry) = store.cache().get(&identity).await? {
        metrics::CACHE_HITS.inc();
        return Ok(Translation {
            identity,
            outcome: TranslateOutcome::Cached(entry),
        });
    }
    metrics::CACHE_MISSES.inc();

    let ticket = match store.locks().try_acquire(&identity).await? {
        AcquireOutcome::Acquired(ticket) => ticket,
        AcquireOutcome::Held(ticket) => {
            metrics::REQUESTS_IN_PROGRESS_REJECTED.inc();
            tracing::warn!(
                artist = %identity.artist,
                title = %identity.title,
                variant = %identity.variant,
                provider = %identity.provider,
                request_id = %ticket.request_id,
                "Duplicate translation request blocked"
            );
            return Ok(Translation {
                identity,
                outcome: TranslateOutcome::InProgress(ticket),
            });
        }
    };
    let guard = store.locks().guard(&identity, &ticket);

    let result = generate_and_store(state, &identity, &text, &ticket.request_id).await;

    if let Err(e) = guard.release().await {
        tracing::warn!(
            request_id = %ticket.request_id,
            error = %e,
            "Failed to release lock, it will expire as stale"
        );
    }

    match result {
        Ok(payload) => Ok(Translation {
            identity,
            outcome: TranslateOutcome::Fresh {
                payload,
                request_id: ticket.request_id,
            },
        }),
        Err(e) => {
            tracing::error!(
                artist = %identity.artist,
                title = %identity.title,
                variant = %identity.variant,
                provider = %identity.provider,
                request_id = %ticket.request_id,
                error = %e,
                "Translation failed"
            );
            Err(e)
        }
    }
}

/// Call the generator, extract its output and cache the result.
async fn generate_and_store(
    state: &AppState,
    identity: &Identity,
    text: &str,
    request_id: &str,
) -> ApiResult<LyricsPayload> {
    tracing::info!(
        artist = %identity.artist,
        title = %identity.title,
        variant = %identity.variant,
        request_id = %request_id,
        "Calling upstream generator"
    );

    let started = Instant::now();
    let raw = state
        .generator
        .generate(&GenerateRequest {
            artist: &identity.artist,
            title: &identity.title,
            text,
            variant: identity.variant,
        })
        .await;
    metrics::UPSTREAM_DURATION.observe(started.elapsed().as_secs_f64());
    let raw = raw.inspect_err(|_| metrics::UPSTREAM_FAILURES.inc())?;

    let extraction = extract_payload(&raw);
    metrics::record_extraction_tier(extraction.tier.as_str());

    state
        .store
        .cache()
        .put(identity, extraction.payload.clone())
        .await?;
    tracing::info!(
        artist = %identity.artist,
        title = %identity.title,
        variant = %identity.variant,
        request_id = %request_id,
        tier = %extraction.tier,
        "Translation cached"
    );

    Ok(extraction.payload)
}
