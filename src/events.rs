// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Mappers from watched objects to the objects they should trigger.
//!
//! The kube runtime already triggers an object on its own changes. These
//! mappers feed its `.watches(...)` relations; they only carry identity, since
//! reconcilers always reload current state.
//!
//! - A leaf Ingress change (deletion included) triggers its root.
//! - A Service change triggers every Ingress the [`Tracker`] associates with it.
//! - A shadow Service or Deployment change triggers its root.
//! - A root Service change triggers every root Deployment it selects.

use crate::controller::object_ref;
use crate::ingress_ext::IngressExt;
use crate::key::ObjectKey;
use crate::labels::OWNED_BY_LABEL;
use crate::reconcilers::shadow::{is_shadow, selects};
use crate::tracker::Tracker;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::ObjectRef;
use kube::{Resource, ResourceExt};
use std::sync::Arc;
use tracing::debug;

/// The root to re-aggregate when `ingress` is a leaf.
#[must_use]
pub fn leaf_owner_refs(ingress: &Ingress) -> Option<ObjectRef<Ingress>> {
    let owner = ingress.owner_root()?;
    let root = ObjectKey::from_resource(ingress).sibling(owner);
    debug!(root = %root, leaf = ?ingress.metadata.name, "Leaf changed");
    Some(object_ref(&root))
}

/// Ingresses tracking `service` as a backend.
#[must_use]
pub fn service_dependents(tracker: &Tracker, service: &Service) -> Vec<ObjectRef<Ingress>> {
    let service_key = ObjectKey::from_resource(service);
    let parents = tracker.lookup_parents(&service_key).unwrap_or_default();
    if !parents.is_empty() {
        debug!(service = %service_key, parents = parents.len(), "Backend service changed");
    }
    parents.iter().map(object_ref::<Ingress>).collect()
}

/// The root of a shadow Service or Deployment.
#[must_use]
pub fn shadow_owner_ref<K>(obj: &K) -> Option<ObjectRef<K>>
where
    K: Resource<DynamicType = ()>,
{
    let owner = obj.labels().get(OWNED_BY_LABEL).filter(|name| !name.is_empty())?;
    Some(object_ref(&ObjectKey::from_resource(obj).sibling(owner.as_str())))
}

/// Root Deployments whose pods `service` selects.
#[must_use]
pub fn selected_deployments(deployments: &[Arc<Deployment>], service: &Service) -> Vec<ObjectRef<Deployment>> {
    if is_shadow(service) {
        return Vec::new();
    }
    let service_key = ObjectKey::from_resource(service);
    deployments
        .iter()
        .map(|deployment| &**deployment)
        .filter(|deployment| !is_shadow(*deployment) && selects(service, deployment))
        .map(ObjectKey::from_resource::<Deployment>)
        .filter(|key| key.cluster == service_key.cluster && key.namespace == service_key.namespace)
        .map(|key| object_ref(&key))
        .collect()
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
