//! Bounded retry with exponential backoff and jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): base × 2^(attempt−1),
    /// capped, plus up to 25% random jitter.
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(16))
            .min(self.max_delay_ms);
        let jitter = if exp >= 4 { rng.gen_range(0..=exp / 4) } else { 0 };
        Duration::from_millis(exp + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let d1 = policy.delay_for(1, &mut rng).as_millis() as u64;
        let d2 = policy.delay_for(2, &mut rng).as_millis() as u64;
        let d4 = policy.delay_for(4, &mut rng).as_millis() as u64;
        assert!((100..=125).contains(&d1), "d1 = {d1}");
        assert!((200..=250).contains(&d2), "d2 = {d2}");
        assert!((350..=437).contains(&d4), "d4 = {d4}");
    }
}
