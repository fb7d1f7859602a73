// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Accessors over the optional-heavy `networking.k8s.io/v1` Ingress types.

use crate::labels::OWNED_BY_LABEL;
use k8s_openapi::api::networking::v1::{
    Ingress, IngressLoadBalancerIngress, IngressLoadBalancerStatus, IngressStatus,
};
use kube::{Resource, ResourceExt};

/// Whether the object carries a deletion timestamp.
pub fn is_deleting<K: Resource>(obj: &K) -> bool {
    obj.meta().deletion_timestamp.is_some()
}

/// Convenience accessors for [`Ingress`].
pub trait IngressExt {
    /// Load-balancer entries reported in the status.
    fn load_balancer_entries(&self) -> &[IngressLoadBalancerIngress];

    /// Replace the load-balancer entries of the status.
    fn set_load_balancer_entries(&mut self, entries: Vec<IngressLoadBalancerIngress>);

    /// Host of every rule, in rule order. Rules without a host yield `""`.
    fn rule_hosts(&self) -> Vec<String>;

    /// Names of the backend services referenced by the rules, first occurrence order.
    fn backend_service_names(&self) -> Vec<String>;

    /// Name of the owning root when this Ingress is a leaf.
    fn owner_root(&self) -> Option<String>;

    fn annotation(&self, key: &str) -> Option<&str>;
}

impl IngressExt for Ingress {
    fn load_balancer_entries(&self) -> &[IngressLoadBalancerIngress] {
        self.status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_deref())
            .unwrap_or_default()
    }

    fn set_load_balancer_entries(&mut self, entries: Vec<IngressLoadBalancerIngress>) {
        let status = self.status.get_or_insert_with(IngressStatus::default);
        status.load_balancer = Some(IngressLoadBalancerStatus {
            ingress: Some(entries),
        });
    }

    fn rule_hosts(&self) -> Vec<String> {
        self.spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(|rules| {
                rules
                    .iter()
                    .map(|r| r.host.clone().unwrap_or_default())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn backend_service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let rules = self
            .spec
            .as_ref()
            .and_then(|s| s.rules.as_ref())
            .map(Vec::as_slice)
            .unwrap_or_default();

        for path in rules
            .iter()
            .filter_map(|r| r.http.as_ref())
            .flat_map(|http| http.paths.iter())
        {
            if let Some(service) = path.backend.service.as_ref() {
                if !names.contains(&service.name) {
                    names.push(service.name.clone());
                }
            }
        }
        names
    }

    fn owner_root(&self) -> Option<String> {
        self.labels()
            .get(OWNED_BY_LABEL)
            .filter(|name| !name.is_empty())
            .cloned()
    }

    fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations().get(key).map(String::as_str)
    }
}

#[cfg(test)]
#[path = "ingress_ext_tests.rs"]
mod ingress_ext_tests;
