// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Access to the declarative state store.
//!
//! Reconcilers never talk to the API server directly: every read and write goes
//! through [`StateStore`], so the same reconciliation code runs against a live
//! cluster ([`KubeStore`]) and against the in-process [`MemoryStore`].
//!
//! Writes follow optimistic concurrency: updates carry the resource version they
//! were computed from, and a stale version surfaces as
//! [`StoreError::Conflict`].
//!
//! [`ObjectStore`] is the kind-generic counterpart used by the shadow
//! reconcilers, which handle Services and Deployments the same way.

pub mod kubernetes;
pub mod memory;
pub mod retry;

use crate::crd::{DNSRecord, DNSRecordSpec};
use crate::errors::StoreError;
use crate::key::ObjectKey;
use k8s_openapi::api::core::v1::Service;
use k8s_openapi::api::networking::v1::Ingress;
use std::collections::BTreeMap;

pub use kubernetes::KubeStore;
pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Turn a `NotFound` into `Ok(None)`.
///
/// # Errors
///
/// Propagates every other error.
pub fn optional<T>(result: StoreResult<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

/// Turn a `NotFound` into success.
///
/// # Errors
///
/// Propagates every other error.
pub fn ignore_not_found(result: StoreResult<()>) -> StoreResult<()> {
    optional(result).map(|_| ())
}

/// Every store interaction the controllers need.
#[async_trait::async_trait]
pub trait StateStore: Send + Sync {
    async fn get_ingress(&self, key: &ObjectKey) -> StoreResult<Ingress>;

    /// List the Ingresses of `cluster`/`namespace` carrying every label of `selector`.
    async fn list_ingresses(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<Ingress>>;

    async fn create_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress>;

    /// Replace metadata and spec. The status is left untouched.
    async fn update_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress>;

    /// Replace the status subresource.
    async fn update_ingress_status(&self, ingress: &Ingress) -> StoreResult<Ingress>;

    /// Merge `annotations` into the stored object without a version check.
    async fn patch_ingress_annotations(
        &self,
        key: &ObjectKey,
        annotations: &BTreeMap<String, String>,
    ) -> StoreResult<Ingress>;

    async fn delete_ingress(&self, key: &ObjectKey) -> StoreResult<()>;

    async fn get_service(&self, key: &ObjectKey) -> StoreResult<Service>;

    async fn delete_secret(&self, key: &ObjectKey) -> StoreResult<()>;

    async fn get_dns_record(&self, key: &ObjectKey) -> StoreResult<DNSRecord>;

    async fn create_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord>;

    /// Merge-patch the spec without a version check.
    async fn patch_dns_record_spec(
        &self,
        key: &ObjectKey,
        spec: &DNSRecordSpec,
    ) -> StoreResult<DNSRecord>;

    /// Replace metadata and spec. The status is left untouched.
    async fn update_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord>;

    /// Replace the status subresource.
    async fn update_dns_record_status(&self, record: &DNSRecord) -> StoreResult<DNSRecord>;

    async fn delete_dns_record(&self, key: &ObjectKey) -> StoreResult<()>;
}

/// Create, read, update and delete for one namespaced kind.
#[async_trait::async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get_object(&self, key: &ObjectKey) -> StoreResult<K>;

    /// List the objects of `cluster`/`namespace` carrying every label of `selector`.
    async fn list_objects(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<K>>;

    async fn create_object(&self, obj: &K) -> StoreResult<K>;

    /// Replace metadata and spec, guarded by the carried resource version.
    async fn update_object(&self, obj: &K) -> StoreResult<K>;

    async fn delete_object(&self, key: &ObjectKey) -> StoreResult<()>;
}
