// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ingress split/aggregate reconciler.
//!
//! A *root* Ingress is the object a user creates. It is split into one *leaf*
//! Ingress per cluster its backend services are placed on; the load-balancer
//! addresses the placement layer reports on the leaves are aggregated back onto
//! the root and published under a generated global hostname.
//!
//! # Root path
//!
//! 1. Assign the generated host (`<id>.<domain>`) with an annotation patch.
//! 2. Ensure the cascade-cleanup finalizer, rewrite custom hosts and request a
//!    certificate, persisting the root only when something changed.
//! 3. Converge the leaf set: delete unwanted leaves, create missing ones and
//!    update stale ones.
//! 4. Aggregate the addresses of the converged leaves into the root status.
//! 5. Upsert or delete the root's `DNSRecord` depending on whether any
//!    load-balancer address has been observed.
//!
//! # Leaf path
//!
//! Orphaned leaves are deleted. Otherwise the addresses of every live leaf of the
//! same root are aggregated into the root's status, the same way step 4 does.

use crate::constants::{
    CONFLICT_REQUEUE_DELAY_MILLIS, DELETION_RECHECK_DELAY_SECS, DNS_RECORD_TTL_SECS,
    GENERATED_HOST_ID_LEN, INGRESS_API_VERSION, INGRESS_CONTROLLER, KIND_INGRESS,
    LEAF_NAME_SEPARATOR, LEAF_TLS_SECRET_SUFFIX, LEAF_UPDATE_ATTEMPTS,
};
use crate::context::Context;
use crate::controller::Reconciler;
use crate::crd::{DNSRecord, DNSRecordSpec, RecordType};
use crate::edge::status_host;
use crate::ingress_ext::{is_deleting, IngressExt};
use crate::key::ObjectKey;
use crate::labels::{
    CASCADE_CLEANUP_FINALIZER, CLUSTER_LABEL, CUSTOM_HOSTS_REPLACED_ANNOTATION,
    HOST_GENERATED_ANNOTATION, K8S_MANAGED_BY, LOGICAL_CLUSTER_ANNOTATION, MANAGED_BY_GLBC,
    OWNED_BY_LABEL, TLS_CERTIFICATE_ANNOTATION,
};
use crate::reconcilers::finalizers::{has_finalizer, with_finalizer, without_finalizer};
use crate::store::{ignore_not_found, optional};
use crate::tls::{certificate_name, CertificateRequest};
use anyhow::{anyhow, bail, Context as _, Result};
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress, IngressTLS};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::controller::Action;
use kube::ResourceExt;
use rand::Rng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const HOST_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Whether an Ingress is a user-created root or a leaf split from one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IngressRole {
    Root,
    Leaf { owner: String },
}

impl IngressRole {
    /// Derived from the `owned-by` label; an absent or empty label marks a root.
    #[must_use]
    pub fn of(ingress: &Ingress) -> Self {
        match ingress.owner_root() {
            Some(owner) => Self::Leaf { owner },
            None => Self::Root,
        }
    }
}

/// `<random id>.<domain>` with a lowercase alphanumeric id.
#[must_use]
pub fn generate_host(domain: &str) -> String {
    let mut rng = rand::thread_rng();
    let id: String = (0..GENERATED_HOST_ID_LEN)
        .map(|_| char::from(HOST_ID_ALPHABET[rng.gen_range(0..HOST_ID_ALPHABET.len())]))
        .collect();
    format!("{id}.{domain}")
}

/// Name of the leaf placed on `cluster`.
#[must_use]
pub fn leaf_name(root: &str, cluster: &str) -> String {
    format!("{root}{LEAF_NAME_SEPARATOR}{cluster}")
}

/// Selector matching every leaf of the root named `root`.
#[must_use]
pub fn leaf_selector(root: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(OWNED_BY_LABEL.to_string(), root.to_string())])
}

/// Rewrite every rule host that differs from `host`.
///
/// Returns the replaced hosts, in rule order.
pub fn replace_custom_hosts(ingress: &mut Ingress, host: &str) -> Vec<String> {
    let mut replaced = Vec::new();
    let Some(rules) = ingress.spec.as_mut().and_then(|s| s.rules.as_mut()) else {
        return replaced;
    };
    for rule in rules.iter_mut() {
        if rule.host.as_deref() == Some(host) {
            continue;
        }
        if let Some(custom) = rule.host.replace(host.to_string()) {
            if !custom.is_empty() && !replaced.contains(&custom) {
                replaced.push(custom);
            }
        }
    }
    replaced
}

/// Build the leaf of `root` for `cluster`.
///
/// The leaf is a copy of the root stripped of identity, finalizers and status,
/// labelled with its owner and cluster. Rules whose host is not the generated
/// host are duplicated once more under the generated host. With `tls` set the
/// leaf carries a TLS entry for the generated host.
#[must_use]
pub fn build_leaf(root: &Ingress, cluster: &str, generated_host: Option<&str>, tls: bool) -> Ingress {
    let root_name = root.name_any();
    let name = leaf_name(&root_name, cluster);

    let mut leaf = Ingress {
        metadata: root.metadata.clone(),
        spec: root.spec.clone(),
        status: None,
    };
    let meta = &mut leaf.metadata;
    meta.name = Some(name.clone());
    meta.finalizers = None;
    meta.owner_references = None;
    meta.resource_version = None;
    meta.uid = None;
    meta.generation = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.managed_fields = None;

    let labels = leaf.labels_mut();
    labels.insert(CLUSTER_LABEL.to_string(), cluster.to_string());
    labels.insert(OWNED_BY_LABEL.to_string(), root_name);

    let Some(host) = generated_host else {
        return leaf;
    };

    if let Some(rules) = leaf.spec.as_mut().and_then(|s| s.rules.as_mut()) {
        let global: Vec<_> = rules
            .iter()
            .filter(|r| r.host.as_deref() != Some(host))
            .cloned()
            .map(|mut r| {
                r.host = Some(host.to_string());
                r
            })
            .collect();
        rules.extend(global);
    }

    if tls {
        if let Some(spec) = leaf.spec.as_mut() {
            spec.tls.get_or_insert_with(Vec::new).push(IngressTLS {
                hosts: Some(vec![host.to_string()]),
                secret_name: Some(format!("{name}{LEAF_TLS_SECRET_SUFFIX}")),
            });
        }
    }
    leaf
}

/// Concatenate the load-balancer entries of every leaf not being deleted.
///
/// Entries are sorted by `(ip, hostname)` so the aggregate does not depend on
/// listing order.
#[must_use]
pub fn aggregate_addresses(leaves: &[Ingress]) -> Vec<IngressLoadBalancerIngress> {
    let mut entries: Vec<IngressLoadBalancerIngress> = leaves
        .iter()
        .filter(|leaf| !is_deleting(*leaf))
        .flat_map(|leaf| leaf.load_balancer_entries().iter().cloned())
        .collect();
    entries.sort_by(|a, b| (&a.ip, &a.hostname).cmp(&(&b.ip, &b.hostname)));
    entries
}

/// The `DNSRecord` publishing `host` for `root`.
#[must_use]
pub fn build_dns_record(root: &Ingress, host: &str, targets: Vec<String>) -> DNSRecord {
    let name = root.name_any();
    let mut record = DNSRecord::new(
        &name,
        DNSRecordSpec {
            dns_name: host.to_string(),
            targets,
            record_type: RecordType::A,
            record_ttl: DNS_RECORD_TTL_SECS,
        },
    );
    record.metadata.namespace = root.namespace();
    record.metadata.labels = Some(BTreeMap::from([(
        K8S_MANAGED_BY.to_string(),
        MANAGED_BY_GLBC.to_string(),
    )]));
    if let Some(cluster) = root.annotations().get(LOGICAL_CLUSTER_ANNOTATION) {
        record.metadata.annotations = Some(BTreeMap::from([(
            LOGICAL_CLUSTER_ANNOTATION.to_string(),
            cluster.clone(),
        )]));
    }
    record.metadata.owner_references = Some(vec![OwnerReference {
        api_version: INGRESS_API_VERSION.to_string(),
        kind: KIND_INGRESS.to_string(),
        name,
        uid: root.uid().unwrap_or_default(),
        controller: Some(true),
        block_owner_deletion: Some(true),
    }]);
    record
}

fn certificate_request(key: &ObjectKey, host: &str) -> CertificateRequest {
    CertificateRequest::new(
        certificate_name(&key.cluster, &key.namespace, &key.name),
        host,
        BTreeMap::from([(K8S_MANAGED_BY.to_string(), MANAGED_BY_GLBC.to_string())]),
        BTreeMap::from([(HOST_GENERATED_ANNOTATION.to_string(), host.to_string())]),
    )
}

fn same_leaf(current: &Ingress, desired: &Ingress) -> bool {
    current.spec == desired.spec
        && current.labels() == desired.labels()
        && current.annotations() == desired.annotations()
}

fn conflict_requeue() -> Action {
    Action::requeue(Duration::from_millis(CONFLICT_REQUEUE_DELAY_MILLIS))
}

/// Reconciles root and leaf Ingresses.
pub struct IngressReconciler {
    ctx: Arc<Context>,
}

impl IngressReconciler {
    #[must_use]
    pub fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    async fn reconcile_root(&self, key: &ObjectKey, root: Ingress) -> Result<Action> {
        if is_deleting(&root) {
            return self.finalize_root(key, root).await;
        }

        let root = self.ensure_generated_host(key, root).await?;
        let root = self.ensure_root_metadata(key, root).await?;

        let leaves = self.reconcile_leaves(key, &root).await?;

        let Some(entries) = self.aggregate_root_status(key, &root, &leaves).await? else {
            return Ok(conflict_requeue());
        };
        self.reconcile_dns_record(key, &root, &entries).await?;
        Ok(Action::await_change())
    }

    async fn ensure_generated_host(&self, key: &ObjectKey, root: Ingress) -> Result<Ingress> {
        if root.annotation(HOST_GENERATED_ANNOTATION).is_some() {
            return Ok(root);
        }

        let host = generate_host(&self.ctx.settings.domain);
        let patched = self
            .ctx
            .store
            .patch_ingress_annotations(
                key,
                &BTreeMap::from([(HOST_GENERATED_ANNOTATION.to_string(), host.clone())]),
            )
            .await
            .with_context(|| format!("failed to assign generated host to Ingress {key}"))?;
        info!(key = %key, host = %host, "Assigned generated host");
        Ok(patched)
    }

    /// Finalizer, custom-host rewrite and certificate request, written back in one update.
    async fn ensure_root_metadata(&self, key: &ObjectKey, root: Ingress) -> Result<Ingress> {
        let mut desired = with_finalizer(&root, CASCADE_CLEANUP_FINALIZER);
        let host = root
            .annotation(HOST_GENERATED_ANNOTATION)
            .map(str::to_string)
            .unwrap_or_default();

        if !self.ctx.settings.custom_hosts_enabled {
            let replaced = replace_custom_hosts(&mut desired, &host);
            if !replaced.is_empty() {
                info!(key = %key, replaced = ?replaced, "Replacing custom hosts with the generated host");
                desired.annotations_mut().insert(
                    CUSTOM_HOSTS_REPLACED_ANNOTATION.to_string(),
                    serde_json::to_string(&replaced)?,
                );
            }
        }

        if let Some(certificates) = &self.ctx.certificates {
            if root.annotation(TLS_CERTIFICATE_ANNOTATION).is_none() {
                let request = certificate_request(key, &host);
                certificates
                    .create(&request)
                    .await
                    .with_context(|| format!("failed to request certificate for {host}"))?;
                info!(key = %key, certificate = request.name(), "Requested certificate");
                desired.annotations_mut().insert(
                    TLS_CERTIFICATE_ANNOTATION.to_string(),
                    request.name().to_string(),
                );
            }
        }

        if desired == root {
            return Ok(root);
        }
        let updated = self.ctx.store.update_ingress(&desired).await?;
        info!(key = %key, "Updated root Ingress");
        Ok(updated)
    }

    /// Locations of the backend services, tracking each service against the root.
    async fn desired_clusters(&self, key: &ObjectKey, root: &Ingress) -> Result<BTreeSet<String>> {
        let mut clusters = BTreeSet::new();
        self.ctx.tracker.untrack(key);
        for service_name in root.backend_service_names() {
            let service_key = key.sibling(service_name);
            self.ctx.tracker.track(key, &service_key);

            let Some(service) = optional(self.ctx.store.get_service(&service_key).await)? else {
                warn!(key = %key, service = %service_key, "Backend service not found, skipping");
                continue;
            };
            match service.labels().get(CLUSTER_LABEL).filter(|c| !c.is_empty()) {
                Some(cluster) => {
                    clusters.insert(cluster.clone());
                }
                None => {
                    warn!(key = %key, service = %service_key, "Backend service is not placed on any cluster, skipping");
                }
            }
        }
        Ok(clusters)
    }

    /// Converge the leaves of `root` and return them.
    async fn reconcile_leaves(&self, key: &ObjectKey, root: &Ingress) -> Result<Vec<Ingress>> {
        let host = root.annotation(HOST_GENERATED_ANNOTATION);
        let tls = self.ctx.certificates.is_some();
        let desired: Vec<Ingress> = self
            .desired_clusters(key, root)
            .await?
            .iter()
            .map(|cluster| build_leaf(root, cluster, host, tls))
            .collect();

        let current = self
            .ctx
            .store
            .list_ingresses(&key.cluster, &key.namespace, &leaf_selector(&key.name))
            .await?;
        let desired_names: BTreeSet<String> = desired.iter().map(ResourceExt::name_any).collect();

        let mut failures = Vec::new();
        for leaf in current.iter().filter(|l| !desired_names.contains(&l.name_any())) {
            let leaf_key = key.sibling(leaf.name_any());
            match ignore_not_found(self.ctx.store.delete_ingress(&leaf_key).await) {
                Ok(()) => info!(key = %key, leaf = %leaf_key, "Deleted leaf Ingress"),
                Err(e) => failures.push(format!("{leaf_key}: {e}")),
            }
        }

        let mut leaves = Vec::with_capacity(desired.len());
        for leaf in desired {
            let existing = current.iter().find(|l| l.name_any() == leaf.name_any());
            match self.upsert_leaf(key, leaf, existing).await {
                Ok(leaf) => leaves.push(leaf),
                Err(e) => failures.push(format!("{e:#}")),
            }
        }

        if !failures.is_empty() {
            bail!("failed to converge leaves of {key}: [{}]", failures.join(", "));
        }
        Ok(leaves)
    }

    async fn upsert_leaf(
        &self,
        key: &ObjectKey,
        desired: Ingress,
        existing: Option<&Ingress>,
    ) -> Result<Ingress> {
        let leaf_key = key.sibling(desired.name_any());
        let mut current = match existing {
            Some(leaf) => leaf.clone(),
            None => match self.ctx.store.create_ingress(&desired).await {
                Ok(created) => {
                    info!(key = %key, leaf = %leaf_key, "Created leaf Ingress");
                    return Ok(created);
                }
                Err(e) if e.is_already_exists() => self.ctx.store.get_ingress(&leaf_key).await?,
                Err(e) => return Err(e.into()),
            },
        };

        for attempt in 1..=LEAF_UPDATE_ATTEMPTS {
            if same_leaf(&current, &desired) {
                return Ok(current);
            }

            let mut update = desired.clone();
            update.metadata.resource_version = current.metadata.resource_version.clone();
            update.metadata.uid = current.metadata.uid.clone();
            update.metadata.finalizers = current.metadata.finalizers.clone();
            update.status = current.status.clone();

            match self.ctx.store.update_ingress(&update).await {
                Ok(updated) => {
                    info!(key = %key, leaf = %leaf_key, "Updated leaf Ingress");
                    return Ok(updated);
                }
                Err(e) if e.is_conflict() && attempt < LEAF_UPDATE_ATTEMPTS => {
                    debug!(leaf = %leaf_key, attempt, "Conflict updating leaf, refetching");
                    current = self.ctx.store.get_ingress(&leaf_key).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(anyhow!("leaf {leaf_key} kept conflicting"))
    }

    /// Resolve DNS targets from load-balancer entries, watching every hostname under `key`.
    async fn resolve_targets(
        &self,
        key: &ObjectKey,
        entries: &[IngressLoadBalancerIngress],
    ) -> Result<Vec<String>> {
        let hostnames: BTreeSet<&str> = entries
            .iter()
            .filter_map(|e| e.hostname.as_deref())
            .filter(|h| !h.is_empty())
            .collect();

        let watcher = &self.ctx.hosts_watcher;
        if watcher
            .watched_hosts(key)
            .iter()
            .any(|h| !hostnames.contains(h.as_str()))
        {
            watcher.stop_watching(key);
        }

        let mut targets: BTreeSet<String> = entries
            .iter()
            .filter_map(|e| e.ip.clone())
            .filter(|ip| !ip.is_empty())
            .collect();

        for hostname in hostnames {
            watcher.start_watching(key, hostname);
            let addresses = self
                .ctx
                .resolver
                .lookup_ip_address(hostname)
                .await
                .with_context(|| format!("failed to resolve load balancer host {hostname}"))?;
            targets.extend(addresses.iter().map(|a| a.ip.to_string()));
        }
        Ok(targets.into_iter().collect())
    }

    async fn reconcile_dns_record(
        &self,
        key: &ObjectKey,
        root: &Ingress,
        entries: &[IngressLoadBalancerIngress],
    ) -> Result<()> {
        let existing = optional(self.ctx.store.get_dns_record(key).await)?;

        let host = match root.annotation(HOST_GENERATED_ANNOTATION) {
            Some(host) if !entries.is_empty() => host,
            _ => {
                self.ctx.hosts_watcher.stop_watching(key);
                if existing.is_some_and(|r| !is_deleting(&r)) {
                    ignore_not_found(self.ctx.store.delete_dns_record(key).await)?;
                    info!(key = %key, "Deleted DNS record, no load balancer address observed");
                }
                return Ok(());
            }
        };

        let targets = self.resolve_targets(key, entries).await?;
        let desired = build_dns_record(root, host, targets);

        match existing {
            None => match self.ctx.store.create_dns_record(&desired).await {
                Ok(_) => info!(key = %key, host, "Created DNS record"),
                Err(e) if e.is_already_exists() => {
                    self.ctx.store.patch_dns_record_spec(key, &desired.spec).await?;
                    info!(key = %key, host, "Updated DNS record");
                }
                Err(e) => return Err(e.into()),
            },
            Some(record) if is_deleting(&record) => {
                bail!("DNS record {key} is being deleted, waiting before recreating it");
            }
            Some(record) if record.spec != desired.spec => {
                self.ctx.store.patch_dns_record_spec(key, &desired.spec).await?;
                info!(key = %key, host, targets = ?desired.spec.targets, "Updated DNS record");
            }
            Some(_) => debug!(key = %key, "DNS record up to date"),
        }
        Ok(())
    }

    /// Cascade deletion of a root.
    ///
    /// The finalizer is only released in a pass that finds no leaf and no
    /// `DNSRecord` left; otherwise the root is re-checked later.
    async fn finalize_root(&self, key: &ObjectKey, root: Ingress) -> Result<Action> {
        if !has_finalizer(&root, CASCADE_CLEANUP_FINALIZER) {
            return Ok(Action::await_change());
        }
        info!(key = %key, "Cleaning up deleted root Ingress");

        let store = &self.ctx.store;
        let selector = leaf_selector(&key.name);
        let leaves = store
            .list_ingresses(&key.cluster, &key.namespace, &selector)
            .await?;

        let mut failures = Vec::new();
        for leaf in &leaves {
            let leaf_key = key.sibling(leaf.name_any());
            self.ctx.hosts_watcher.stop_watching(&leaf_key);
            if let Err(e) = ignore_not_found(store.delete_ingress(&leaf_key).await) {
                failures.push(format!("{leaf_key}: {e}"));
            }
            if self.ctx.certificates.is_some() {
                let secret_key = leaf_key.sibling(format!("{}{LEAF_TLS_SECRET_SUFFIX}", leaf_key.name));
                if let Err(e) = ignore_not_found(store.delete_secret(&secret_key).await) {
                    failures.push(format!("{secret_key}: {e}"));
                }
            }
        }

        if let Err(e) = ignore_not_found(store.delete_dns_record(key).await) {
            failures.push(format!("DNS record {key}: {e}"));
        }

        if let Some(certificates) = &self.ctx.certificates {
            let host = root.annotation(HOST_GENERATED_ANNOTATION).unwrap_or_default();
            if let Err(e) = certificates.delete(&certificate_request(key, host)).await {
                failures.push(format!("certificate: {e:#}"));
            }
        }

        self.ctx.hosts_watcher.stop_watching(key);
        self.ctx.tracker.untrack(key);
        self.forget_edge(key)?;

        if !failures.is_empty() {
            bail!("failed to clean up root Ingress {key}: [{}]", failures.join(", "));
        }

        let remaining_leaves = store
            .list_ingresses(&key.cluster, &key.namespace, &selector)
            .await?
            .len();
        let record_remains = optional(store.get_dns_record(key).await)?.is_some();
        if remaining_leaves > 0 || record_remains {
            debug!(
                key = %key,
                remaining_leaves,
                record_remains,
                "Waiting for children of deleted root Ingress"
            );
            return Ok(Action::requeue(Duration::from_secs(
                DELETION_RECHECK_DELAY_SECS,
            )));
        }

        ignore_not_found(
            store
                .update_ingress(&without_finalizer(&root, CASCADE_CLEANUP_FINALIZER))
                .await
                .map(|_| ()),
        )?;
        info!(key = %key, "Removed cascade finalizer from root Ingress");
        Ok(Action::await_change())
    }

    async fn release_leaf(&self, key: &ObjectKey, leaf: &Ingress) -> Result<()> {
        if !has_finalizer(leaf, CASCADE_CLEANUP_FINALIZER) {
            return Ok(());
        }
        ignore_not_found(
            self.ctx
                .store
                .update_ingress(&without_finalizer(leaf, CASCADE_CLEANUP_FINALIZER))
                .await
                .map(|_| ()),
        )?;
        info!(key = %key, "Removed cascade finalizer from deleting leaf Ingress");
        Ok(())
    }

    async fn reconcile_leaf(&self, key: &ObjectKey, leaf: Ingress, owner: &str) -> Result<Action> {
        let root_key = key.sibling(owner);
        let Some(root) = optional(self.ctx.store.get_ingress(&root_key).await)? else {
            if is_deleting(&leaf) {
                self.release_leaf(key, &leaf).await?;
            } else {
                ignore_not_found(self.ctx.store.delete_ingress(key).await)?;
                info!(key = %key, root = %root_key, "Deleted orphaned leaf Ingress");
            }
            return Ok(Action::await_change());
        };

        if is_deleting(&leaf) {
            self.release_leaf(key, &leaf).await?;
        }

        let leaves = self
            .ctx
            .store
            .list_ingresses(&root_key.cluster, &root_key.namespace, &leaf_selector(owner))
            .await?;

        match self.aggregate_root_status(&root_key, &root, &leaves).await? {
            Some(_) => Ok(Action::await_change()),
            None => Ok(conflict_requeue()),
        }
    }

    /// Write the addresses of `leaves` into the status of `root`.
    ///
    /// Returns the aggregated addresses, or `None` when the status write hit a
    /// conflict and the caller should retry. With the edge proxy enabled the
    /// root status carries the status host while the aggregate is returned
    /// unchanged for DNS.
    async fn aggregate_root_status(
        &self,
        root_key: &ObjectKey,
        root: &Ingress,
        leaves: &[Ingress],
    ) -> Result<Option<Vec<IngressLoadBalancerIngress>>> {
        let addresses = aggregate_addresses(leaves);
        let mut desired = root.clone();
        desired.set_load_balancer_entries(addresses.clone());

        if let Some(edge) = &self.ctx.edge {
            edge.cache.update_ingress(&desired);
            edge.publish()
                .with_context(|| format!("failed to publish edge snapshot for {root_key}"))?;
            desired.set_load_balancer_entries(vec![IngressLoadBalancerIngress {
                hostname: Some(status_host(&self.ctx.settings.domain, &desired)),
                ..IngressLoadBalancerIngress::default()
            }]);
        }

        if desired.load_balancer_entries() == root.load_balancer_entries() {
            debug!(root = %root_key, "Root status up to date");
            return Ok(Some(addresses));
        }

        match self.ctx.store.update_ingress_status(&desired).await {
            Ok(_) => {
                info!(
                    root = %root_key,
                    addresses = desired.load_balancer_entries().len(),
                    "Updated root Ingress status"
                );
                Ok(Some(addresses))
            }
            Err(e) if e.is_conflict() => {
                debug!(root = %root_key, "Conflict updating root status, requeueing");
                Ok(None)
            }
            Err(e) if e.is_not_found() => Ok(Some(addresses)),
            Err(e) => Err(e.into()),
        }
    }

    /// Drop a root from the edge cache and republish when it was cached.
    fn forget_edge(&self, key: &ObjectKey) -> Result<()> {
        match &self.ctx.edge {
            Some(edge) if edge.cache.delete_ingress(key) => edge.publish(),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for IngressReconciler {
    fn name(&self) -> &'static str {
        INGRESS_CONTROLLER
    }

    async fn process(&self, key: &ObjectKey) -> Result<Action> {
        let Some(ingress) = optional(self.ctx.store.get_ingress(key).await)? else {
            debug!(key = %key, "Ingress no longer exists");
            self.ctx.hosts_watcher.stop_watching(key);
            self.ctx.tracker.untrack(key);
            self.forget_edge(key)?;
            return Ok(Action::await_change());
        };

        match IngressRole::of(&ingress) {
            IngressRole::Root => self.reconcile_root(key, ingress).await,
            IngressRole::Leaf { owner } => self.reconcile_leaf(key, ingress, &owner).await,
        }
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod ingress_tests;
