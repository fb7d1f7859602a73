// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Edge-proxy configuration snapshots.
//!
//! The [`SnapshotCache`] holds the aggregated version of every root Ingress
//! and renders them into a [`Snapshot`]: one virtual host per root, routing its
//! rule hosts to the load-balancer endpoints of every cluster the root is placed
//! on. Snapshots are handed to a [`SnapshotSink`] keyed by proxy node id.

use crate::constants::EDGE_UPSTREAM_PORT;
use crate::ingress_ext::IngressExt;
use crate::key::ObjectKey;
use k8s_openapi::api::networking::v1::Ingress;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;
use tracing::debug;

/// A route of a virtual host.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub prefix: String,
    pub cluster: String,
}

/// Routing configuration of one root Ingress.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VirtualHost {
    pub name: String,
    pub domains: Vec<String>,
    pub routes: Vec<Route>,
    /// Upstream endpoints as `host:port`.
    pub endpoints: Vec<String>,
}

/// Complete edge-proxy configuration.
#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Content hash of the virtual hosts.
    pub version: String,
    pub virtual_hosts: Vec<VirtualHost>,
}

/// Translate an aggregated root Ingress into its virtual host.
#[must_use]
pub fn virtual_host(key: &ObjectKey, ingress: &Ingress) -> VirtualHost {
    let name = key.to_string();

    let endpoints = ingress
        .load_balancer_entries()
        .iter()
        .filter_map(|lb| {
            lb.hostname
                .as_deref()
                .filter(|h| !h.is_empty())
                .or_else(|| lb.ip.as_deref().filter(|ip| !ip.is_empty()))
        })
        .map(|host| format!("{host}:{EDGE_UPSTREAM_PORT}"))
        .collect();

    let mut domains = Vec::new();
    let mut routes = Vec::new();
    let rules = ingress
        .spec
        .as_ref()
        .and_then(|s| s.rules.as_deref())
        .unwrap_or_default();
    for rule in rules {
        let (Some(host), Some(http)) = (rule.host.as_deref(), rule.http.as_ref()) else {
            continue;
        };
        if host.is_empty() {
            continue;
        }
        for path in &http.paths {
            routes.push(Route {
                prefix: path.path.clone().unwrap_or_else(|| "/".to_string()),
                cluster: name.clone(),
            });
        }
        domains.push(host.to_string());
        domains.push(format!("{host}:*"));
    }

    VirtualHost {
        name,
        domains,
        routes,
        endpoints,
    }
}

/// Cache of aggregated root Ingresses.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    ingresses: Mutex<BTreeMap<ObjectKey, Ingress>>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the aggregated root.
    pub fn update_ingress(&self, ingress: &Ingress) {
        let key = ObjectKey::from_resource(ingress);
        debug!(key = %key, "Updating edge cache entry");
        self.ingresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, ingress.clone());
    }

    /// Remove a root. Returns whether it was present.
    pub fn delete_ingress(&self, key: &ObjectKey) -> bool {
        self.ingresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ingresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render every cached root, ordered by key.
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        let virtual_hosts: Vec<VirtualHost> = self
            .ingresses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(key, ingress)| virtual_host(key, ingress))
            .collect();

        let json = serde_json::to_string(&virtual_hosts).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());

        Snapshot {
            version: format!("{:x}", hasher.finalize()),
            virtual_hosts,
        }
    }
}

/// Receives snapshots for edge-proxy nodes.
pub trait SnapshotSink: Send + Sync {
    /// Publish `snapshot` for `node_id`.
    ///
    /// # Errors
    ///
    /// Returns an error when the snapshot cannot be delivered.
    fn set_snapshot(&self, node_id: &str, snapshot: Snapshot) -> anyhow::Result<()>;
}

/// Latest snapshot per node, published on a watch channel.
pub struct WatchSnapshotSink {
    tx: watch::Sender<BTreeMap<String, Snapshot>>,
}

impl WatchSnapshotSink {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(BTreeMap::new());
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BTreeMap<String, Snapshot>> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn current(&self, node_id: &str) -> Option<Snapshot> {
        self.tx.borrow().get(node_id).cloned()
    }
}

impl Default for WatchSnapshotSink {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotSink for WatchSnapshotSink {
    fn set_snapshot(&self, node_id: &str, snapshot: Snapshot) -> anyhow::Result<()> {
        self.tx.send_if_modified(|snapshots| {
            if snapshots.get(node_id) == Some(&snapshot) {
                return false;
            }
            debug!(node_id, version = %snapshot.version, "Publishing edge snapshot");
            snapshots.insert(node_id.to_string(), snapshot);
            true
        });
        Ok(())
    }
}

/// 32-bit FNV-1a hash.
#[must_use]
pub fn fnv32a(data: &[u8]) -> u32 {
    const OFFSET_BASIS: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    data.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(PRIME)
    })
}

/// Hostname to report in a root's status when the edge proxy fronts it.
///
/// The first rule host when every rule host is within `domain`, otherwise a
/// stable host derived from the root's identity.
#[must_use]
pub fn status_host(domain: &str, ingress: &Ingress) -> String {
    let hosts = ingress.rule_hosts();
    let suffix = format!(".{domain}");
    let all_in_domain = hosts.iter().all(|h| h == domain || h.ends_with(&suffix));

    match hosts.first() {
        Some(first) if all_in_domain => first.clone(),
        _ => {
            let key = ObjectKey::from_resource(ingress);
            let id = fnv32a(format!("{}{}{}", key.name, key.namespace, key.cluster).as_bytes());
            format!("{id}.{domain}")
        }
    }
}

#[cfg(test)]
#[path = "edge_tests.rs"]
mod edge_tests;
