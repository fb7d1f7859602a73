// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the Ingress and `DNSRecord` controllers.
//!
//! Every collaborator the reconcilers talk to is injected here as a trait object,
//! so the same reconcilers run against the Kubernetes API in production and
//! against in-memory fakes in tests.

use crate::constants::EDGE_NODE_ID;
use crate::crd::DNSZone;
use crate::dns::ZonePublisher;
use crate::edge::{SnapshotCache, SnapshotSink};
use crate::net::{HostResolver, HostsWatcher};
use crate::store::StateStore;
use crate::tls::CertificateProvider;
use crate::tracker::Tracker;
use anyhow::Result;
use std::sync::Arc;

/// Shared context passed to all controllers.
#[derive(Clone)]
pub struct Context {
    /// Source of truth for Ingresses, Services, Secrets and `DNSRecord`s
    pub store: Arc<dyn StateStore>,

    /// Service -> Ingress index
    pub tracker: Arc<Tracker>,

    /// Polls load-balancer hostnames and enqueues roots on address changes
    pub hosts_watcher: Arc<HostsWatcher>,

    /// Resolves load-balancer hostnames into DNS targets
    pub resolver: Arc<dyn HostResolver>,

    /// Certificate provider, present when TLS is enabled
    pub certificates: Option<Arc<dyn CertificateProvider>>,

    /// Edge-proxy snapshot cache, present when the edge proxy is enabled
    pub edge: Option<EdgeProxy>,

    /// Publishes `DNSRecord`s to the configured zones
    pub publisher: Arc<ZonePublisher>,

    pub settings: Settings,
}

/// Plain configuration values read once at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Base domain of generated hostnames
    pub domain: String,

    /// Whether user-supplied rule hosts are kept next to the generated host
    pub custom_hosts_enabled: bool,

    /// Zones every `DNSRecord` is published to
    pub zones: Vec<DNSZone>,
}

/// Edge-proxy cache together with the sink its snapshots are pushed to.
#[derive(Clone)]
pub struct EdgeProxy {
    pub cache: Arc<SnapshotCache>,
    pub sink: Arc<dyn SnapshotSink>,
}

impl EdgeProxy {
    #[must_use]
    pub fn new(cache: Arc<SnapshotCache>, sink: Arc<dyn SnapshotSink>) -> Self {
        Self { cache, sink }
    }

    /// Render the cache and hand the snapshot to the sink.
    ///
    /// # Errors
    ///
    /// Returns an error when the sink rejects the snapshot.
    pub fn publish(&self) -> Result<()> {
        self.sink.set_snapshot(EDGE_NODE_ID, self.cache.to_snapshot())
    }
}
