// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Hostname resolution and address watching.
//!
//! - [`resolver`] - pluggable [`HostResolver`] backends (live DNS, config map,
//!   static table) and the mutex-serializing [`SafeHostResolver`] decorator
//! - [`watcher`] - [`HostsWatcher`], which re-resolves watched hostnames on a
//!   TTL-driven schedule and reports changes as keys on a channel

pub mod resolver;
pub mod watcher;

use crate::errors::ResolveError;
use std::net::IpAddr;
use std::time::Duration;

pub use resolver::{ConfigMapHostResolver, DnsHostResolver, SafeHostResolver, StaticHostResolver};
pub use watcher::HostsWatcher;

/// One resolved address of a hostname.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAddress {
    pub host: String,
    pub ip: IpAddr,
    pub ttl: Duration,
}

impl HostAddress {
    #[must_use]
    pub fn new(host: impl Into<String>, ip: IpAddr, ttl: Duration) -> Self {
        Self {
            host: host.into(),
            ip,
            ttl,
        }
    }
}

/// Resolves a hostname to its current addresses and their TTLs.
#[async_trait::async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolve `host`.
    ///
    /// # Errors
    ///
    /// Returns a [`ResolveError`] when the backend cannot answer for `host`.
    async fn lookup_ip_address(&self, host: &str) -> Result<Vec<HostAddress>, ResolveError>;
}
