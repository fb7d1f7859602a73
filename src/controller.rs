// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Adapters between [`kube::runtime::Controller`] and glbc reconcilers.
//!
//! The kube runtime deduplicates triggers, never runs two reconciles of the
//! same object at once and schedules whatever [`Action`] a reconcile returns.
//! This module adds the per-key failure budget on top of it:
//!
//! - success clears the key's failure count;
//! - a failure is retried with exponential backoff while the key has failed at
//!   most [`MAX_REQUEUES`] times in a row;
//! - after that the key is dropped and waits for its next change event.

use crate::constants::{MAX_REQUEUES, RETRY_BASE_DELAY_MILLIS, RETRY_MAX_DELAY_SECS};
use crate::key::ObjectKey;
use crate::metrics;
use anyhow::Result;
use futures::{Stream, StreamExt};
use kube::runtime::controller::Action;
use kube::runtime::reflector::ObjectRef;
use kube::Resource;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, warn};

/// Error surfaced to the kube runtime by a failed reconcile.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ReconcileError(#[from] anyhow::Error);

/// Reconciles the object identified by a key.
#[async_trait::async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Load the object for `key` and converge it.
    ///
    /// The returned action tells the runtime when to look at the key again.
    async fn process(&self, key: &ObjectKey) -> Result<Action>;
}

/// Backoff before retry number `failures` (1-based): 5 ms doubling up to 1000 s.
#[must_use]
pub fn retry_delay(failures: u32) -> Duration {
    let exponent = failures.saturating_sub(1).min(31);
    Duration::from_millis(RETRY_BASE_DELAY_MILLIS)
        .saturating_mul(1_u32 << exponent)
        .min(Duration::from_secs(RETRY_MAX_DELAY_SECS))
}

/// Consecutive failure counts per key.
#[derive(Debug, Default)]
pub struct RetryBudget {
    failures: Mutex<HashMap<ObjectKey, u32>>,
}

impl RetryBudget {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn failures_mut(&self) -> std::sync::MutexGuard<'_, HashMap<ObjectKey, u32>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn succeeded(&self, key: &ObjectKey) {
        self.failures_mut().remove(key);
    }

    /// Count a failure of `key`.
    ///
    /// Returns the delay before the next attempt, or `None` once the key has
    /// used up its retries. The count is reset in that case, so a later change
    /// event starts a fresh budget.
    pub fn failed(&self, key: &ObjectKey) -> Option<Duration> {
        let mut failures = self.failures_mut();
        let count = failures.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count > MAX_REQUEUES {
            failures.remove(key);
            return None;
        }
        Some(retry_delay(*count))
    }

    #[must_use]
    pub fn failures(&self, key: &ObjectKey) -> u32 {
        self.failures_mut().get(key).copied().unwrap_or_default()
    }
}

/// Context handed to the kube runtime: a reconciler and its retry budget.
pub struct Runner<R> {
    reconciler: Arc<R>,
    budget: RetryBudget,
}

impl<R: Reconciler> Runner<R> {
    #[must_use]
    pub fn new(reconciler: Arc<R>) -> Arc<Self> {
        Arc::new(Self {
            reconciler,
            budget: RetryBudget::new(),
        })
    }

    #[must_use]
    pub fn budget(&self) -> &RetryBudget {
        &self.budget
    }

    /// Reconcile `key`, recording timing metrics and clearing its budget on success.
    pub async fn reconcile_key(&self, key: &ObjectKey) -> Result<Action, ReconcileError> {
        let name = self.reconciler.name();
        debug!(controller = name, key = %key, "Reconciling");

        let start = Instant::now();
        match self.reconciler.process(key).await {
            Ok(action) => {
                metrics::record_reconciliation_success(name, start.elapsed());
                self.budget.succeeded(key);
                Ok(action)
            }
            Err(e) => {
                metrics::record_reconciliation_error(name, start.elapsed());
                Err(e.into())
            }
        }
    }

    /// Decide what the runtime does after `key` failed with `err`.
    pub fn on_error(&self, key: &ObjectKey, err: &ReconcileError) -> Action {
        let name = self.reconciler.name();
        match self.budget.failed(key) {
            Some(delay) => {
                warn!(
                    controller = name,
                    key = %key,
                    retry_in = ?delay,
                    error = ?err,
                    "Error reconciling key, retrying"
                );
                metrics::record_reconciliation_requeue(name, "error");
                Action::requeue(delay)
            }
            None => {
                metrics::record_dropped_key(name);
                error!(
                    controller = name,
                    key = %key,
                    error = ?err,
                    "Dropping key after failed retries"
                );
                Action::await_change()
            }
        }
    }
}

/// Reconcile function passed to `Controller::run`.
pub async fn reconcile<K, R>(obj: Arc<K>, runner: Arc<Runner<R>>) -> Result<Action, ReconcileError>
where
    K: Resource,
    R: Reconciler,
{
    let key = ObjectKey::from_resource(&*obj);
    runner.reconcile_key(&key).await
}

/// Error policy passed to `Controller::run`.
pub fn error_policy<K, R>(obj: Arc<K>, err: &ReconcileError, runner: Arc<Runner<R>>) -> Action
where
    K: Resource,
    R: Reconciler,
{
    runner.on_error(&ObjectKey::from_resource(&*obj), err)
}

/// Reference the kube runtime uses to look up the object behind `key`.
#[must_use]
pub fn object_ref<K>(key: &ObjectKey) -> ObjectRef<K>
where
    K: Resource<DynamicType = ()>,
{
    ObjectRef::new(&key.name).within(&key.namespace)
}

/// Turn a notification channel into a `reconcile_on` trigger stream.
pub fn key_stream<K>(rx: mpsc::UnboundedReceiver<ObjectKey>) -> impl Stream<Item = ObjectRef<K>> + Send
where
    K: Resource<DynamicType = ()> + 'static,
{
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|key| (key, rx))
    })
    .map(|key| {
        debug!(key = %key, "Resolved addresses changed, enqueueing");
        object_ref(&key)
    })
}

/// Resolves once `shutdown` flips to `true` or its sender goes away.
pub async fn shutdown_requested(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod controller_tests;
