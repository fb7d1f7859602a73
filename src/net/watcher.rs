// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TTL-driven re-resolution of load-balancer hostnames.
//!
//! Every `(key, host)` pair gets its own polling task. The first successful
//! resolution is recorded as the baseline; afterwards a poll whose addresses
//! differ from the stored set, or whose TTLs grew, stores the new set and sends
//! the key on the notification channel. The next poll is scheduled from the
//! smallest TTL of the freshly resolved set.

use super::{HostAddress, HostResolver};
use crate::constants::{
    WATCH_EMPTY_INTERVAL_SECS, WATCH_MIN_INTERVAL_SECS, WATCH_RETRY_DELAY_SECS,
};
use crate::key::ObjectKey;
use crate::metrics::{record_host_address_change, ACTIVE_HOST_WATCHES};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

/// Maps the smallest record TTL to the delay before the next poll.
pub type IntervalFn = fn(Duration) -> Duration;

/// Default schedule: half the TTL.
#[must_use]
pub fn half_ttl(ttl: Duration) -> Duration {
    ttl / 2
}

/// Outcome of comparing a fresh resolution against the stored one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordsChange {
    Unchanged,
    AddressesChanged,
    TtlIncreased,
}

impl RecordsChange {
    #[must_use]
    pub fn is_changed(self) -> bool {
        self != Self::Unchanged
    }

    fn as_label(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::AddressesChanged => "addresses",
            Self::TtlIncreased => "ttl",
        }
    }
}

/// Compare two address sets position by position.
///
/// A TTL decrease alone is not a change: TTLs count down between polls.
#[must_use]
pub fn compare_records(previous: &[HostAddress], fresh: &[HostAddress]) -> RecordsChange {
    if previous.len() != fresh.len() {
        return RecordsChange::AddressesChanged;
    }
    if previous.iter().zip(fresh).any(|(old, new)| old.ip != new.ip) {
        return RecordsChange::AddressesChanged;
    }
    if previous.iter().zip(fresh).any(|(old, new)| new.ttl > old.ttl) {
        return RecordsChange::TtlIncreased;
    }
    RecordsChange::Unchanged
}

/// Delay before the next poll of a freshly resolved set.
#[must_use]
pub fn next_interval(records: &[HostAddress], interval: IntervalFn) -> Duration {
    match records.iter().map(|r| r.ttl).min() {
        None => Duration::from_secs(WATCH_EMPTY_INTERVAL_SECS),
        Some(ttl) => interval(ttl).max(Duration::from_secs(WATCH_MIN_INTERVAL_SECS)),
    }
}

type Watches = HashMap<ObjectKey, HashMap<String, oneshot::Sender<()>>>;

/// Registry of per-key hostname watches.
pub struct HostsWatcher {
    resolver: Arc<dyn HostResolver>,
    notify: mpsc::UnboundedSender<ObjectKey>,
    shutdown: watch::Receiver<bool>,
    interval: IntervalFn,
    watches: Mutex<Watches>,
}

impl HostsWatcher {
    #[must_use]
    pub fn new(
        resolver: Arc<dyn HostResolver>,
        notify: mpsc::UnboundedSender<ObjectKey>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            resolver,
            notify,
            shutdown,
            interval: half_ttl,
            watches: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: IntervalFn) -> Self {
        self.interval = interval;
        self
    }

    /// Start polling `host` on behalf of `key`.
    ///
    /// Returns `false` when the pair is already watched.
    pub fn start_watching(&self, key: &ObjectKey, host: &str) -> bool {
        let mut watches = self.watches.lock().unwrap_or_else(PoisonError::into_inner);
        let hosts = watches.entry(key.clone()).or_default();
        if hosts.contains_key(host) {
            return false;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        hosts.insert(host.to_string(), stop_tx);
        ACTIVE_HOST_WATCHES.inc();
        info!(key = %key, host, "Watching host");

        tokio::spawn(poll_host(
            key.clone(),
            host.to_string(),
            Arc::clone(&self.resolver),
            self.notify.clone(),
            self.interval,
            stop_rx,
            self.shutdown.clone(),
        ));
        true
    }

    /// Stop every watch registered for `key`. A no-op for unknown keys.
    pub fn stop_watching(&self, key: &ObjectKey) {
        let removed = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        let Some(hosts) = removed else {
            return;
        };
        for (host, stop) in hosts {
            // The task may already have exited on shutdown.
            let _ = stop.send(());
            ACTIVE_HOST_WATCHES.dec();
            debug!(key = %key, host = %host, "Stopped watching host");
        }
    }

    #[must_use]
    pub fn is_watching(&self, key: &ObjectKey, host: &str) -> bool {
        self.watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .is_some_and(|hosts| hosts.contains_key(host))
    }

    /// Hosts currently watched for `key`, sorted.
    #[must_use]
    pub fn watched_hosts(&self, key: &ObjectKey) -> Vec<String> {
        let mut hosts: Vec<String> = self
            .watches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|hosts| hosts.keys().cloned().collect())
            .unwrap_or_default();
        hosts.sort();
        hosts
    }
}

async fn poll_host(
    key: ObjectKey,
    host: String,
    resolver: Arc<dyn HostResolver>,
    notify: mpsc::UnboundedSender<ObjectKey>,
    interval: IntervalFn,
    mut stop: oneshot::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut current: Option<Vec<HostAddress>> = None;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let delay = match resolver.lookup_ip_address(&host).await {
            Err(err) => {
                warn!(key = %key, host = %host, error = %err, "Failed to resolve watched host");
                Duration::from_secs(WATCH_RETRY_DELAY_SECS)
            }
            Ok(mut fresh) => {
                fresh.sort_by_key(|r| r.ip);
                let delay = next_interval(&fresh, interval);
                let change = current
                    .as_deref()
                    .map(|previous| compare_records(previous, &fresh));
                match change {
                    None => current = Some(fresh),
                    Some(change) if change.is_changed() => {
                        info!(key = %key, host = %host, change = change.as_label(), "Watched host changed");
                        record_host_address_change(change.as_label());
                        current = Some(fresh);
                        if notify.send(key.clone()).is_err() {
                            break;
                        }
                    }
                    Some(_) => {}
                }
                delay
            }
        };

        tokio::select! {
            _ = &mut stop => break,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            () = tokio::time::sleep(delay) => {}
        }
    }

    debug!(key = %key, host = %host, "Host watch loop exited");
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod watcher_tests;
