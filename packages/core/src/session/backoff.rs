//! Exponential reconnect backoff with jitter.

use std::time::Duration;

use rand::Rng;

use super::config::BackoffConfig;

/// Delay generator for consecutive reconnect attempts
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Delay before the next attempt; grows until `max_delay`.
    ///
    /// Jitter never takes a delay below `min_delay` or above `max_delay`.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        let jitter = self.config.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        } else {
            1.0
        };
        base.mul_f64(factor)
            .max(self.config.min_delay)
            .min(self.config.max_delay)
    }

    /// Connection reached `Ready`; start over from `min_delay`
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scale = self.config.multiplier.max(1.0).powi(exponent);
        let max = self.config.max_delay.as_secs_f64();
        let delay = (self.config.min_delay.as_secs_f64() * scale).min(max);
        Duration::from_secs_f64(delay)
    }
}
