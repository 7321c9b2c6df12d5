use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio::sync::Semaphore;
use tracing::debug;

/// Tracks AniList's `X-RateLimit-*` response headers and throttles outgoing
/// requests to stay under the remaining budget, falling back to a fixed
/// concurrency cap until the first response has been observed.
pub struct AniListRateLimiter {
    semaphore: Semaphore,
    remaining: AtomicI64,
    reset_at_unix: AtomicI64,
}

impl AniListRateLimiter {
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Semaphore::new(max_concurrent),
            remaining: AtomicI64::new(i64::MAX),
            reset_at_unix: AtomicI64::new(0),
        }
    }

    /// Waits until a request slot is available, sleeping past the reported
    /// reset time if the budget has been exhausted.
    pub async fn acquire(&self) {
        if self.remaining.load(Ordering::Relaxed) <= 0 {
            let now = chrono::Utc::now().timestamp();
            let reset_at = self.reset_at_unix.load(Ordering::Relaxed);
            if reset_at > now {
                let wait = Duration::from_secs(u64::try_from(reset_at - now).unwrap_or(1));
                debug!(?wait, "anilist rate limit exhausted, sleeping until reset");
                tokio::time::sleep(wait).await;
            }
        }

        let _permit = self.semaphore.acquire().await;
        // Permit is dropped immediately; the semaphore only bounds
        // in-flight request concurrency, not request rate.
    }

    /// Updates remaining-budget tracking from an AniList response.
    pub fn observe_headers(&self, headers: &HeaderMap) {
        if let Some(remaining) = header_i64(headers, "x-ratelimit-remaining") {
            self.remaining.store(remaining, Ordering::Relaxed);
        }
        if let Some(reset) = header_i64(headers, "x-ratelimit-reset") {
            self.reset_at_unix.store(reset, Ordering::Relaxed);
        }
    }

    /// Extracts a `Retry-After` duration from a 429 response, if present.
    #[must_use]
    pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
        header_i64(headers, "retry-after").map(|secs| Duration::from_secs(secs.max(0) as u64))
    }
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}
