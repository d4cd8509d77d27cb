//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Retry schedule for transient sink failures.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Base delay before the first retry.
    pub initial_delay: Duration,
    /// Ceiling for the exponential growth.
    pub max_delay: Duration,
    /// Growth factor per attempt.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based), jittered to
    /// between 50% and 100% of the exponential value so concurrent
    /// pipelines do not retry in lockstep.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.initial_delay.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_secs_f64());
        let jittered = capped * rand::thread_rng().gen_range(0.5..=1.0);
        Duration::from_secs_f64(jittered)
    }
}
