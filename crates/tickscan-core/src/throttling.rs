use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-adapter minimum gap between upstream calls.
///
/// Each adapter owns one pacer (clones share state). The limiter state is
/// atomic, so the gap holds even when scan tasks run on several worker
/// threads.
#[derive(Clone)]
pub struct CallPacer {
    limiter: Option<Arc<DirectRateLimiter>>,
    min_gap: Duration,
}

impl CallPacer {
    /// A zero gap disables pacing.
    pub fn new(min_gap: Duration) -> Self {
        let limiter = Quota::with_period(min_gap).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self { limiter, min_gap }
    }

    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_gap(&self) -> Duration {
        self.min_gap
    }

    /// Suspends until a call is allowed under the minimum gap.
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}

impl Default for CallPacer {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

impl std::fmt::Debug for CallPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallPacer")
            .field("min_gap", &self.min_gap)
            .finish()
    }
}
