//! Retry policy with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::models::RetryConfig;

/// Result of a retried operation plus the number of attempts it took.
#[derive(Debug)]
pub struct Retried<T, E> {
    pub outcome: std::result::Result<T, E>,
    pub attempts: u32,
}

/// How often and how patiently a failed operation is retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    /// Budget for the initial attempt, all retries and the sleeps between them
    pub max_elapsed: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: Duration::from_millis(config.jitter_ms),
            max_elapsed: Duration::from_millis(config.max_total_ms),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
            max_elapsed: Duration::MAX,
        }
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform random jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_ms)
        };
        self.backoff_for(attempt) + Duration::from_millis(jitter)
    }

    /// Run `op` until it succeeds, fails permanently, runs out of retries or
    /// would overrun `max_elapsed`.
    ///
    /// `op` receives the time left in the budget so it can bound its own
    /// attempt.
    pub async fn retry<T, E, F, Fut, P>(&self, mut op: F, is_transient: P) -> Retried<T, E>
    where
        F: FnMut(Duration) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let started = Instant::now();
        let mut attempts = 0;

        loop {
            let remaining = self.max_elapsed.saturating_sub(started.elapsed());
            attempts += 1;

            let error = match op(remaining).await {
                Ok(value) => {
                    return Retried {
                        outcome: Ok(value),
                        attempts,
                    };
                }
                Err(e) => e,
            };

            let retries_done = attempts - 1;
            if !is_transient(&error) || retries_done >= self.max_retries {
                return Retried {
                    outcome: Err(error),
                    attempts,
                };
            }

            let delay = self.delay_for(retries_done);
            if started.elapsed() + delay >= self.max_elapsed {
                log::debug!("Retry budget of {:?} exhausted after {attempts} attempts", self.max_elapsed);
                return Retried {
                    outcome: Err(error),
                    attempts,
                };
            }

            log::debug!(
                "Transient failure, attempt {}/{}, retrying in {}ms",
                attempts,
                self.max_retries + 1,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
