//! Blocking token-bucket rate limiter shared by all outgoing requests.
//!
//! Tokens refill continuously at `rate_per_sec` up to `burst`. `acquire`
//! blocks the calling thread until a token is available, so sequential and
//! parallel scans obey the same request budget.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    rate_per_sec: f64,
    burst: f64,
}

impl RateLimiter {
    /// A limiter allowing `rate_per_sec` requests per second with bursts of `burst`.
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            rate_per_sec: rate_per_sec.max(f64::MIN_POSITIVE),
            burst,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        self.bucket.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
        bucket.last_refill = now;
    }

    /// Take a token if one is available right now.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Block until a token is available, then take it. Returns the time spent waiting.
    pub fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            let wait = {
                let mut bucket = self.lock();
                self.refill(&mut bucket);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return started.elapsed();
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limited, waiting for token");
            std::thread::sleep(wait.max(Duration::from_millis(1)));
        }
    }
}
