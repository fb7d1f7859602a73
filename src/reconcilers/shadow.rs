// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Service and Deployment shadow reconcilers.
//!
//! A root Service lists the clusters it is placed on in the
//! [`PLACEMENT_ANNOTATION`]. For each of them a *shadow* copy named
//! `<root>--<cluster>` is kept next to the root, labelled with the target
//! cluster and the root it belongs to. A root Deployment is placed wherever the
//! root Services selecting its pods are placed.
//!
//! # Root path
//!
//! 1. Hold the root with the [`SHADOW_CLEANUP_FINALIZER`] while it has locations.
//! 2. Create missing shadows and update stale ones.
//! 3. Mark shadows for locations that went away with a delete-at time and
//!    delete them; [`delete_delay`](super::delete_delay) keeps them around until
//!    that time has passed.
//!
//! Deleting the root deletes every shadow at once and then releases the root.
//!
//! # Shadow path
//!
//! A deleting shadow is requeued until its delete-at time, then its finalizer is
//! released.

use crate::constants::{DEPLOYMENT_SHADOW_CONTROLLER, SERVICE_SHADOW_CONTROLLER};
use crate::controller::Reconciler;
use crate::ingress_ext::is_deleting;
use crate::key::ObjectKey;
use crate::labels::{CLUSTER_LABEL, OWNED_BY_LABEL, PLACEMENT_ANNOTATION, SHADOW_CLEANUP_FINALIZER};
use crate::reconcilers::delete_delay::{clean_for_deletion, mark_with_default_ttl, time_to_live};
use crate::reconcilers::finalizers::{has_finalizer, with_finalizer, without_finalizer};
use crate::reconcilers::ingress::leaf_name;
use crate::store::{ignore_not_found, optional, ObjectStore};
use anyhow::Result;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::controller::Action;
use kube::{Resource, ResourceExt};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info};

/// Kinds that are copied into per-cluster shadows.
pub trait Shadowed:
    Resource<DynamicType = (), Scope = NamespaceResourceScope> + Clone + Debug + Send + Sync + 'static
{
    /// Drop the spec and status fields the API server fills in per object.
    fn clear_server_fields(&mut self);

    /// Whether `self` already runs the spec of `desired`.
    fn spec_matches(&self, desired: &Self) -> bool;

    /// Take over the spec of `desired`, keeping fields the API server assigned.
    fn take_spec(&mut self, desired: &Self);
}

impl Shadowed for Service {
    fn clear_server_fields(&mut self) {
        self.status = None;
        if let Some(spec) = self.spec.as_mut() {
            spec.cluster_ip = None;
            spec.cluster_ips = None;
        }
    }

    fn spec_matches(&self, desired: &Self) -> bool {
        let mut expected = self.clone();
        expected.take_spec(desired);
        expected.spec == self.spec
    }

    fn take_spec(&mut self, desired: &Self) {
        let assigned = self
            .spec
            .as_ref()
            .map(|spec| (spec.cluster_ip.clone(), spec.cluster_ips.clone()));
        self.spec.clone_from(&desired.spec);
        if let (Some(spec), Some((ip, ips))) = (self.spec.as_mut(), assigned) {
            spec.cluster_ip = ip;
            spec.cluster_ips = ips;
        }
    }
}

impl Shadowed for Deployment {
    fn clear_server_fields(&mut self) {
        self.status = None;
    }

    fn spec_matches(&self, desired: &Self) -> bool {
        self.spec == desired.spec
    }

    fn take_spec(&mut self, desired: &Self) {
        self.spec.clone_from(&desired.spec);
    }
}

/// Clusters listed in the placement annotation, without blanks or repeats.
#[must_use]
pub fn placement<K: Resource>(obj: &K) -> Vec<String> {
    let Some(value) = obj.annotations().get(PLACEMENT_ANNOTATION) else {
        return Vec::new();
    };
    value
        .split(',')
        .map(str::trim)
        .filter(|location| !location.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Whether `obj` is a shadow rather than a root.
#[must_use]
pub fn is_shadow<K: Resource>(obj: &K) -> bool {
    obj.labels().contains_key(OWNED_BY_LABEL)
}

/// Selector matching every shadow of the root named `root`.
#[must_use]
pub fn shadow_selector(root: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(OWNED_BY_LABEL.to_string(), root.to_string())])
}

/// Whether the root Service `service` selects the pods of `deployment`.
///
/// A Service without a selector selects nothing.
#[must_use]
pub fn selects(service: &Service, deployment: &Deployment) -> bool {
    let Some(selector) = service
        .spec
        .as_ref()
        .and_then(|spec| spec.selector.as_ref())
        .filter(|selector| !selector.is_empty())
    else {
        return false;
    };
    let pod_labels = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.template.metadata.as_ref())
        .and_then(|meta| meta.labels.as_ref());
    pod_labels.is_some_and(|labels| selector.iter().all(|(k, v)| labels.get(k) == Some(v)))
}

/// Clusters a root Deployment is placed on: those of every root Service selecting it.
#[must_use]
pub fn deployment_locations(deployment: &Deployment, services: &[Service]) -> Vec<String> {
    services
        .iter()
        .filter(|service| !is_shadow(*service) && selects(service, deployment))
        .flat_map(placement::<Service>)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The shadow of `root` for `location`.
#[must_use]
pub fn build_shadow<K: Shadowed>(root: &K, location: &str) -> K {
    let root_name = root.name_any();
    let mut shadow = root.clone();
    shadow.clear_server_fields();

    let meta = shadow.meta_mut();
    meta.name = Some(leaf_name(&root_name, location));
    meta.uid = None;
    meta.resource_version = None;
    meta.generation = None;
    meta.creation_timestamp = None;
    meta.deletion_timestamp = None;
    meta.deletion_grace_period_seconds = None;
    meta.finalizers = None;
    meta.owner_references = None;
    meta.managed_fields = None;
    if let Some(annotations) = meta.annotations.as_mut() {
        annotations.remove(PLACEMENT_ANNOTATION);
    }
    let labels = meta.labels.get_or_insert_with(BTreeMap::new);
    labels.insert(CLUSTER_LABEL.to_string(), location.to_string());
    labels.insert(OWNED_BY_LABEL.to_string(), root_name);
    shadow
}

/// Whether `current` carries everything `desired` asks for.
fn in_sync<K: Shadowed>(current: &K, desired: &K) -> bool {
    let contains = |have: &BTreeMap<String, String>, want: &BTreeMap<String, String>| {
        want.iter().all(|(k, v)| have.get(k) == Some(v))
    };
    current.spec_matches(desired)
        && contains(current.labels(), desired.labels())
        && contains(current.annotations(), desired.annotations())
}

/// Converge the shadows of `root` onto `locations`.
///
/// # Errors
///
/// Returns an error when a store call fails.
pub async fn converge_shadows<K: Shadowed>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    root: &K,
    locations: &[String],
    now: DateTime<Utc>,
) -> Result<Action> {
    if is_deleting(root) {
        return finalize_root(store, key, root).await;
    }
    if locations.is_empty() && !has_finalizer(root, SHADOW_CLEANUP_FINALIZER) {
        return Ok(Action::await_change());
    }

    let mut root = root.clone();
    if !locations.is_empty() && !has_finalizer(&root, SHADOW_CLEANUP_FINALIZER) {
        root = store
            .update_object(&with_finalizer(&root, SHADOW_CLEANUP_FINALIZER))
            .await?;
    }

    let existing: BTreeMap<String, K> = store
        .list_objects(&key.cluster, &key.namespace, &shadow_selector(&key.name))
        .await?
        .into_iter()
        .map(|shadow| (shadow.name_any(), shadow))
        .collect();

    let mut wanted = BTreeSet::new();
    for location in locations {
        let desired = build_shadow(&root, location);
        let name = desired.name_any();
        match existing.get(&name) {
            None => {
                info!(root = %key, shadow = %name, "Creating shadow");
                store.create_object(&desired).await?;
            }
            Some(current) if is_deleting(current) => {
                debug!(root = %key, shadow = %name, "Shadow still being deleted");
            }
            Some(current) if !in_sync(current, &desired) => {
                let mut updated = current.clone();
                updated.take_spec(&desired);
                updated.labels_mut().extend(desired.labels().clone());
                updated.annotations_mut().extend(desired.annotations().clone());
                debug!(root = %key, shadow = %name, "Updating shadow");
                store.update_object(&updated).await?;
            }
            Some(_) => {}
        }
        wanted.insert(name);
    }

    for (name, shadow) in &existing {
        if wanted.contains(name) || is_deleting(shadow) {
            continue;
        }
        info!(root = %key, shadow = %name, "Scheduling removal of shadow");
        if let Some(marked) = mark_with_default_ttl(shadow, now) {
            store.update_object(&marked).await?;
        }
        ignore_not_found(store.delete_object(&key.sibling(name.as_str())).await)?;
    }

    if locations.is_empty() {
        store
            .update_object(&without_finalizer(&root, SHADOW_CLEANUP_FINALIZER))
            .await?;
    }
    Ok(Action::await_change())
}

async fn finalize_root<K: Shadowed>(store: &dyn ObjectStore<K>, key: &ObjectKey, root: &K) -> Result<Action> {
    if !has_finalizer(root, SHADOW_CLEANUP_FINALIZER) {
        return Ok(Action::await_change());
    }

    let shadows = store
        .list_objects(&key.cluster, &key.namespace, &shadow_selector(&key.name))
        .await?;
    for shadow in &shadows {
        let cleaned = clean_for_deletion(shadow);
        if cleaned.finalizers() != shadow.finalizers() {
            optional(store.update_object(&cleaned).await)?;
        }
        ignore_not_found(store.delete_object(&ObjectKey::from_resource(shadow)).await)?;
    }

    info!(root = %key, shadows = shadows.len(), "Shadows deleted, releasing root");
    optional(
        store
            .update_object(&without_finalizer(root, SHADOW_CLEANUP_FINALIZER))
            .await,
    )?;
    Ok(Action::await_change())
}

/// Release a deleting shadow once its delete-at time has passed.
///
/// # Errors
///
/// Returns an error on a malformed delete-at annotation or a failed store call.
pub async fn release_shadow<K: Shadowed>(
    store: &dyn ObjectStore<K>,
    key: &ObjectKey,
    shadow: &K,
    now: DateTime<Utc>,
) -> Result<Action> {
    if !is_deleting(shadow) {
        return Ok(Action::await_change());
    }
    let ttl = time_to_live(shadow, now)?;
    if !ttl.is_zero() {
        debug!(shadow = %key, remaining = ?ttl, "Shadow not yet due for removal");
        return Ok(Action::requeue(ttl));
    }

    let cleaned = clean_for_deletion(shadow);
    if cleaned.finalizers() != shadow.finalizers() {
        info!(shadow = %key, "Releasing shadow");
        optional(store.update_object(&cleaned).await)?;
    }
    Ok(Action::await_change())
}

/// Splits placed Services into per-cluster shadows.
pub struct ServiceShadowReconciler {
    store: Arc<dyn ObjectStore<Service>>,
}

impl ServiceShadowReconciler {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore<Service>>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Reconciler for ServiceShadowReconciler {
    fn name(&self) -> &'static str {
        SERVICE_SHADOW_CONTROLLER
    }

    async fn process(&self, key: &ObjectKey) -> Result<Action> {
        let Some(service) = optional(self.store.get_object(key).await)? else {
            return Ok(Action::await_change());
        };
        let now = Utc::now();
        if is_shadow(&service) {
            return release_shadow(&*self.store, key, &service, now).await;
        }
        converge_shadows(&*self.store, key, &service, &placement(&service), now).await
    }
}

/// Places Deployments wherever the Services selecting them are placed.
pub struct DeploymentShadowReconciler {
    deployments: Arc<dyn ObjectStore<Deployment>>,
    services: Arc<dyn ObjectStore<Service>>,
}

impl DeploymentShadowReconciler {
    #[must_use]
    pub fn new(
        deployments: Arc<dyn ObjectStore<Deployment>>,
        services: Arc<dyn ObjectStore<Service>>,
    ) -> Self {
        Self {
            deployments,
            services,
        }
    }
}

#[async_trait::async_trait]
impl Reconciler for DeploymentShadowReconciler {
    fn name(&self) -> &'static str {
        DEPLOYMENT_SHADOW_CONTROLLER
    }

    async fn process(&self, key: &ObjectKey) -> Result<Action> {
        let Some(deployment) = optional(self.deployments.get_object(key).await)? else {
            return Ok(Action::await_change());
        };
        let now = Utc::now();
        if is_shadow(&deployment) {
            return release_shadow(&*self.deployments, key, &deployment, now).await;
        }

        let services = self
            .services
            .list_objects(&key.cluster, &key.namespace, &BTreeMap::new())
            .await?;
        let locations = deployment_locations(&deployment, &services);
        converge_shadows(&*self.deployments, key, &deployment, &locations, now).await
    }
}

#[cfg(test)]
#[path = "shadow_tests.rs"]
mod shadow_tests;
