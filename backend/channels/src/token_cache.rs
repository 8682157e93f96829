//! Access-token cache with single-flight refresh.
//!
//! The slot lock is held across the refresh, so concurrent callers that find
//! the token stale wait for the one in-flight refresh and then reuse its
//! result instead of issuing their own.

use std::future::Future;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Longest lifetime trusted from upstream. WeWork issues 7200s tokens.
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct TokenCache {
    margin: Duration,
    slot: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    /// `margin` is how long before expiry a token counts as stale.
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            slot: Mutex::new(None),
        }
    }

    /// Return the cached token, or run `refresh` to obtain a new one.
    ///
    /// `refresh` yields the token and its lifetime, capped at
    /// [`MAX_TOKEN_TTL`]. On failure nothing is cached and the next caller
    /// retries. A margin too large to add to the clock never counts as fresh.
    pub async fn get_or_refresh<F, Fut, E>(&self, refresh: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(String, Duration), E>>,
    {
        let mut slot = self.slot.lock().await;
        if let Some(token) = slot.as_ref() {
            let fresh = Instant::now()
                .checked_add(self.margin)
                .is_some_and(|deadline| deadline < token.expires_at);
            if fresh {
                return Ok(token.value.clone());
            }
            debug!("Access token is within refresh margin");
        }

        let (value, ttl) = refresh().await?;
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TOKEN_TTL)).unwrap_or(now);
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }

    /// Drop the cached token, e.g. after the API rejected it.
    pub async fn invalidate(&self) {
        self.slot.lock().await.take();
    }
}
