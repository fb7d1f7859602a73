// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Resource identity used as the controller, tracker and watch key.

use crate::labels::LOGICAL_CLUSTER_ANNOTATION;
use kube::{Resource, ResourceExt};
use std::fmt;

/// Identity of a namespaced object: `(logical cluster, namespace, name)`.
///
/// The logical cluster is read from the `kcp.dev/logical-cluster` annotation and
/// is empty for objects living in a plain Kubernetes cluster.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub cluster: String,
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Build the key of an object from its metadata.
    #[must_use]
    pub fn from_resource<K: Resource>(obj: &K) -> Self {
        Self {
            cluster: obj
                .annotations()
                .get(LOGICAL_CLUSTER_ANNOTATION)
                .cloned()
                .unwrap_or_default(),
            namespace: obj.namespace().unwrap_or_default(),
            name: obj.name_any(),
        }
    }

    /// Key of another object with the given name in the same cluster and namespace.
    #[must_use]
    pub fn sibling(&self, name: impl Into<String>) -> Self {
        Self {
            cluster: self.cluster.clone(),
            namespace: self.namespace.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cluster.is_empty() {
            write!(f, "{}/{}", self.namespace, self.name)
        } else {
            write!(f, "{}|{}/{}", self.cluster, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod key_tests;
