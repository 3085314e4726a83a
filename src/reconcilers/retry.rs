// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retry-with-give-up for per-service operations.
//!
//! Reconcile and remove share one policy: run the operation, and on failure run
//! it again until the configured number of attempts is used up. Exhausting the
//! attempts is logged once and reported to the caller; it never aborts the
//! control loop, so one broken service cannot hold up the others.
//!
//! Attempts follow each other immediately unless a backoff is configured, in
//! which case the delay grows exponentially with ±10% jitter up to a cap.

use std::future::Future;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, warn};

use crate::config::{RetryBackoffConfig, SyncConfig};
use crate::metrics;

/// Randomization factor applied to every backoff delay (±10%)
const RANDOMIZATION_FACTOR: f64 = 0.1;

/// Simple exponential backoff implementation.
///
/// Provides exponential backoff with randomization (jitter) to prevent thundering herd.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    /// Current interval duration
    pub current_interval: Duration,
    /// Maximum interval duration
    pub max_interval: Duration,
    /// Backoff multiplier (typically 2.0 for doubling)
    pub multiplier: f64,
    /// Randomization factor (e.g., 0.1 for ±10%)
    pub randomization_factor: f64,
}

impl ExponentialBackoff {
    /// Backoff starting at the configured initial interval.
    #[must_use]
    pub fn from_config(config: &RetryBackoffConfig) -> Self {
        let max_interval = Duration::from_millis(config.max_interval_ms);
        Self {
            current_interval: Duration::from_millis(config.initial_interval_ms).min(max_interval),
            max_interval,
            multiplier: config.multiplier.max(1.0),
            randomization_factor: RANDOMIZATION_FACTOR,
        }
    }

    /// Get the next backoff interval and grow the one after it.
    pub fn next_backoff(&mut self) -> Duration {
        let interval = self.current_interval;
        let jittered = self.apply_jitter(interval);

        let next = interval.as_secs_f64() * self.multiplier;
        self.current_interval = Duration::from_secs_f64(next).min(self.max_interval);

        jittered
    }

    /// Apply randomization (jitter) to an interval.
    fn apply_jitter(&self, interval: Duration) -> Duration {
        if self.randomization_factor == 0.0 || interval.is_zero() {
            return interval;
        }

        let secs = interval.as_secs_f64();
        let delta = secs * self.randomization_factor;

        let mut rng = rand::thread_rng();
        let jittered = rng.gen_range((secs - delta)..=(secs + delta));

        Duration::from_secs_f64(jittered.max(0.0))
    }
}

/// How many times to attempt an operation, and how long to wait in between.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first; never less than one
    pub max_attempts: u32,
    /// Delay between attempts; `None` retries immediately
    pub backoff: Option<RetryBackoffConfig>,
}

impl RetryPolicy {
    /// Retry immediately, up to `max_attempts` attempts in total.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: None,
        }
    }

    /// Policy from the controller configuration.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            max_attempts: config.reconciliation_retries.max(1),
            backoff: config.retry_backoff.clone(),
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The operation succeeded on the given attempt
    Succeeded {
        /// 1-based attempt number that succeeded
        attempts: u32,
    },
    /// Every attempt failed
    GaveUp {
        /// Number of attempts made
        attempts: u32,
    },
}

impl RetryOutcome {
    /// Whether the operation eventually succeeded.
    #[must_use]
    pub fn succeeded(self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// `operation` names the kind of work for logs and metrics (e.g. `reconcile`),
/// `subject` the service it applies to. `op` receives the 1-based attempt number.
/// Failures are logged at `warn` while attempts remain and once at `error` on give-up.
pub async fn retry_with_give_up<F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    subject: &str,
    mut op: F,
) -> RetryOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff.as_ref().map(ExponentialBackoff::from_config);
    let mut attempt = 1;

    loop {
        let start = Instant::now();
        match op(attempt).await {
            Ok(()) => {
                metrics::record_attempt_success(operation, start.elapsed());
                debug!(service = %subject, attempt, "{} succeeded", operation);
                return RetryOutcome::Succeeded { attempts: attempt };
            }
            Err(e) => {
                metrics::record_attempt_error(operation, start.elapsed());

                if attempt >= max_attempts {
                    metrics::record_give_up(operation);
                    error!(
                        service = %subject,
                        attempts = attempt,
                        "Failed to {} {} after {} attempts - giving up: {:#}",
                        operation,
                        subject,
                        attempt,
                        e
                    );
                    return RetryOutcome::GaveUp { attempts: attempt };
                }

                warn!(
                    service = %subject,
                    attempt,
                    "Failed to {} {} on attempt {} - retrying: {:#}",
                    operation,
                    subject,
                    attempt,
                    e
                );

                if let Some(backoff) = backoff.as_mut() {
                    tokio::time::sleep(backoff.next_backoff()).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
