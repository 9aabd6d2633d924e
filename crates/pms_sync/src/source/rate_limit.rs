//! Proactive request pacing for the source API.

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared limiter awaited before every page request.
///
/// ```ignore
/// let limiter = ApiRateLimiter::new(5); // 5 requests per second
/// limiter.wait().await;
/// ```
#[derive(Clone)]
pub struct ApiRateLimiter {
    inner: Arc<GovernorRateLimiter>,
}

impl ApiRateLimiter {
    /// Limiter allowing `requests_per_second`, or `None` when pacing is off (`0`).
    pub fn new(requests_per_second: u32) -> Option<Self> {
        let rps = NonZeroU32::new(requests_per_second)?;
        Some(Self {
            inner: Arc::new(RateLimiter::direct(Quota::per_second(rps))),
        })
    }

    /// Wait until another request is allowed.
    pub async fn wait(&self) {
        self.inner.until_ready().await;
    }
}

impl std::fmt::Debug for ApiRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRateLimiter").finish_non_exhaustive()
    }
}
