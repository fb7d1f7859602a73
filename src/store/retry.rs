// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-place retries of transient Kubernetes API failures.
//!
//! Throttling (429), server errors (5xx) and transport failures are retried with
//! jittered exponential delays. Everything else, 404 and 409 included, goes back
//! to the caller untouched so it can be mapped onto [`StoreError`](crate::errors::StoreError).

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const FIRST_DELAY: Duration = Duration::from_millis(100);
const MAX_DELAY: Duration = Duration::from_secs(10);
const RETRY_BUDGET: Duration = Duration::from_secs(60);
/// Jitter spread around each delay, as a fraction of it
const JITTER: f64 = 0.1;

/// Delay schedule of one retried call: 100ms doubling up to 10s, for at most a minute.
#[derive(Debug)]
pub struct ApiBackoff {
    attempt: u32,
    deadline: Instant,
}

impl ApiBackoff {
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt: 0,
            deadline: Instant::now() + RETRY_BUDGET,
        }
    }

    /// Un-jittered delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn base_delay(attempt: u32) -> Duration {
        FIRST_DELAY
            .checked_mul(2u32.saturating_pow(attempt))
            .map_or(MAX_DELAY, |delay| delay.min(MAX_DELAY))
    }

    /// Next jittered delay, `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if Instant::now() >= self.deadline {
            return None;
        }
        let base = Self::base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
        Some(base.mul_f64(factor))
    }
}

impl Default for ApiBackoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `call` until it succeeds, fails permanently, or the retry budget runs out.
///
/// # Errors
///
/// The first non-transient error, or the last transient one once the budget is spent.
pub async fn retry_api_call<T, F, Fut>(mut call: F, what: &str) -> Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, kube::Error>>,
{
    let mut backoff = ApiBackoff::new();
    let mut failures = 0u32;
    loop {
        let err = match call().await {
            Ok(value) => {
                if failures > 0 {
                    debug!(call = what, failures, "API call recovered");
                }
                return Ok(value);
            }
            Err(err) if is_transient(&err) => err,
            Err(err) => return Err(err),
        };
        failures += 1;
        let Some(delay) = backoff.next_delay() else {
            warn!(call = what, failures, error = %err, "Giving up on API call");
            return Err(err);
        };
        debug!(call = what, failures, ?delay, error = %err, "Transient API error");
        tokio::time::sleep(delay).await;
    }
}

pub(crate) fn is_transient(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(response) => response.code == 429 || response.code >= 500,
        kube::Error::Service(_) => true,
        _ => false,
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod retry_tests;
