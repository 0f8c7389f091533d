// Token-bucket rate limiter shared by every request a client sends.
//
// Capacity and refill rate both equal the configured requests-per-second.
// Each token returns to the bucket exactly one period after it was taken,
// which is tracked as a ring of the last `capacity` grant instants. A new
// grant is scheduled no earlier than one period after the oldest of them, so
// no window of one period ever holds more than `capacity` grants.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::error::Error;

/// Refill period: one full bucket per second.
const PERIOD: Duration = Duration::from_secs(1);

/// Internally synchronized token bucket, safe for concurrent `acquire`.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: usize,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` grants per second.
    pub fn new(requests_per_second: u32) -> Self {
        let capacity = usize::try_from(requests_per_second.max(1)).unwrap_or(usize::MAX);
        Self {
            capacity,
            grants: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Bucket capacity (equal to the per-second rate).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Take one token, suspending until it is available.
    ///
    /// Fails with [`Error::RateLimit`] without consuming anything if the
    /// token would only become available after `deadline`. Dropping the
    /// returned future while it waits still counts the token as spent.
    pub async fn acquire(&self, deadline: Instant) -> Result<(), Error> {
        let grant_at = self.reserve(deadline)?;
        let now = Instant::now();
        if grant_at > now {
            trace!(wait = ?(grant_at - now), "waiting for rate token");
            tokio::time::sleep_until(grant_at).await;
        }
        Ok(())
    }

    /// Reserve the next grant instant, or fail if it lands past `deadline`.
    fn reserve(&self, deadline: Instant) -> Result<Instant, Error> {
        let mut grants = self.grants.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        let grant_at = if grants.len() < self.capacity {
            now
        } else {
            grants
                .front()
                .map_or(now, |oldest| (*oldest + PERIOD).max(now))
        };

        if grant_at > deadline {
            return Err(Error::RateLimit);
        }

        if grants.len() >= self.capacity {
            grants.pop_front();
        }
        grants.push_back(grant_at);
        Ok(grant_at)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    /// Fire `n` simultaneous acquisitions and return each grant's offset
    /// from the start, sorted.
    async fn burst(limiter: Arc<RateLimiter>, n: usize) -> Vec<Duration> {
        let start = Instant::now();
        let deadline = far_deadline();
        let tasks: Vec<_> = (0..n)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire(deadline).await.unwrap();
                    Instant::now() - start
                })
            })
            .collect();

        let mut offsets = Vec::with_capacity(n);
        for task in tasks {
            offsets.push(task.await.unwrap());
        }
        offsets.sort();
        offsets
    }

    #[tokio::test(start_paused = true)]
    async fn twenty_requests_at_ten_per_second_split_into_two_windows() {
        let limiter = Arc::new(RateLimiter::new(10));
        let offsets = burst(limiter, 20).await;

        let first_second = offsets.iter().filter(|d| **d < PERIOD).count();
        assert_eq!(first_second, 10);
        assert!(offsets[10..].iter().all(|d| *d >= PERIOD && *d < PERIOD * 2));
    }

    #[tokio::test(start_paused = true)]
    async fn no_window_exceeds_capacity() {
        let limiter = Arc::new(RateLimiter::new(3));
        let offsets = burst(limiter, 17).await;

        for (i, start) in offsets.iter().enumerate() {
            let in_window = offsets[i..]
                .iter()
                .filter(|d| **d < *start + PERIOD)
                .count();
            assert!(in_window <= 3, "window at {start:?} held {in_window} grants");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_after_idle_period() {
        let limiter = RateLimiter::new(2);
        limiter.acquire(far_deadline()).await.unwrap();
        limiter.acquire(far_deadline()).await.unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;

        let before = Instant::now();
        limiter.acquire(far_deadline()).await.unwrap();
        assert_eq!(Instant::now(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_before_next_token_is_a_rate_limit_error() {
        let limiter = RateLimiter::new(1);
        limiter.acquire(far_deadline()).await.unwrap();

        let short = Instant::now() + Duration::from_millis(500);
        let result = limiter.acquire(short).await;
        assert!(matches!(result, Err(Error::RateLimit)));

        // The failed attempt consumed nothing: the next slot is still 1s out.
        let start = Instant::now();
        limiter.acquire(far_deadline()).await.unwrap();
        assert_eq!(Instant::now() - start, PERIOD);
    }
}
