// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`HostResolver`] backends.

use super::{HostAddress, HostResolver};
use crate::errors::ResolveError;
use hickory_resolver::proto::rr::RData;
use hickory_resolver::TokioAsyncResolver;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Live DNS
// ============================================================================

/// Resolves hostnames with the system resolver configuration (`/etc/resolv.conf`).
pub struct DnsHostResolver {
    resolver: TokioAsyncResolver,
}

impl DnsHostResolver {
    /// Build a resolver from the system configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the system resolver configuration cannot be read.
    pub fn from_system_conf() -> anyhow::Result<Self> {
        Ok(Self {
            resolver: TokioAsyncResolver::tokio_from_system_conf()?,
        })
    }
}

#[async_trait::async_trait]
impl HostResolver for DnsHostResolver {
    async fn lookup_ip_address(&self, host: &str) -> Result<Vec<HostAddress>, ResolveError> {
        let lookup =
            self.resolver
                .lookup_ip(host)
                .await
                .map_err(|e| ResolveError::LookupFailed {
                    host: host.to_string(),
                    reason: e.to_string(),
                })?;

        let addresses: Vec<HostAddress> = lookup
            .as_lookup()
            .records()
            .iter()
            .filter_map(|record| {
                let ip = match record.data()? {
                    RData::A(a) => IpAddr::V4(a.0),
                    RData::AAAA(aaaa) => IpAddr::V6(aaaa.0),
                    _ => return None,
                };
                Some(HostAddress::new(
                    host,
                    ip,
                    Duration::from_secs(u64::from(record.ttl())),
                ))
            })
            .collect();

        debug!(host, count = addresses.len(), "Resolved host");
        Ok(addresses)
    }
}

// ============================================================================
// Config map
// ============================================================================

/// One entry of a config-map address list.
#[derive(Debug, Deserialize)]
struct AddressEntry {
    #[serde(alias = "IP")]
    ip: IpAddr,
    /// TTL in seconds
    #[serde(alias = "TTL")]
    ttl: u64,
}

/// Parse a config-map value (`[{"ip": "192.0.2.1", "ttl": 60}]`) into addresses.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidEntry`] when the value is not a valid list.
pub fn parse_address_list(host: &str, value: &str) -> Result<Vec<HostAddress>, ResolveError> {
    let entries: Vec<AddressEntry> =
        serde_json::from_str(value).map_err(|e| ResolveError::InvalidEntry {
            host: host.to_string(),
            reason: e.to_string(),
        })?;
    Ok(entries
        .into_iter()
        .map(|entry| HostAddress::new(host, entry.ip, Duration::from_secs(entry.ttl)))
        .collect())
}

/// Resolves hostnames from a config map whose keys are hostnames and whose
/// values are JSON address lists. Useful to fake load balancers in test clusters.
pub struct ConfigMapHostResolver {
    api: Api<ConfigMap>,
    namespace: String,
    name: String,
}

impl ConfigMapHostResolver {
    #[must_use]
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl HostResolver for ConfigMapHostResolver {
    async fn lookup_ip_address(&self, host: &str) -> Result<Vec<HostAddress>, ResolveError> {
        let config_map =
            self.api
                .get(&self.name)
                .await
                .map_err(|e| ResolveError::ConfigMapUnavailable {
                    namespace: self.namespace.clone(),
                    name: self.name.clone(),
                    reason: e.to_string(),
                })?;

        let value = config_map
            .data
            .as_ref()
            .and_then(|data| data.get(host))
            .ok_or_else(|| ResolveError::UnknownHost {
                host: host.to_string(),
            })?;

        parse_address_list(host, value)
    }
}

// ============================================================================
// Static table
// ============================================================================

/// In-memory hostname table.
#[derive(Debug, Default)]
pub struct StaticHostResolver {
    hosts: Mutex<HashMap<String, Vec<HostAddress>>>,
}

impl StaticHostResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the addresses of `host`.
    pub fn set(&self, host: &str, addresses: Vec<HostAddress>) {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(host.to_string(), addresses);
    }

    pub fn remove(&self, host: &str) {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(host);
    }
}

#[async_trait::async_trait]
impl HostResolver for StaticHostResolver {
    async fn lookup_ip_address(&self, host: &str) -> Result<Vec<HostAddress>, ResolveError> {
        self.hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(host)
            .cloned()
            .ok_or_else(|| ResolveError::UnknownHost {
                host: host.to_string(),
            })
    }
}

// ============================================================================
// Serializing decorator
// ============================================================================

/// Serializes every lookup of the wrapped resolver through one mutex.
pub struct SafeHostResolver<R> {
    inner: R,
    lock: tokio::sync::Mutex<()>,
}

impl<R: HostResolver> SafeHostResolver<R> {
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait::async_trait]
impl<R: HostResolver> HostResolver for SafeHostResolver<R> {
    async fn lookup_ip_address(&self, host: &str) -> Result<Vec<HostAddress>, ResolveError> {
        let _guard = self.lock.lock().await;
        self.inner.lookup_ip_address(host).await
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
