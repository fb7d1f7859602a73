// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process [`StateStore`].
//!
//! Behaves like the API server where the controllers can observe it:
//! - every write assigns a new resource version
//! - `update*` calls carrying a stale resource version fail with a conflict
//! - spec changes bump `metadata.generation`
//! - deleting an object that still has finalizers only sets its deletion
//!   timestamp; the object disappears once an update clears the finalizers
//!
//! Writes are counted per operation so tests can assert that a reconcile pass
//! changed nothing.

use super::{ObjectStore, StateStore, StoreResult};
use crate::constants::{KIND_DNS_RECORD, KIND_INGRESS};
use crate::crd::{DNSRecord, DNSRecordSpec};
use crate::errors::StoreError;
use crate::key::ObjectKey;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::{Ingress, IngressLoadBalancerIngress};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::jiff::Timestamp;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Objects with a spec and a status subresource.
trait Stored: Resource + Clone {
    const KIND: &'static str;

    fn same_spec(&self, other: &Self) -> bool;

    fn copy_status_from(&mut self, other: &Self);
}

impl Stored for Ingress {
    const KIND: &'static str = KIND_INGRESS;

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

impl Stored for DNSRecord {
    const KIND: &'static str = KIND_DNS_RECORD;

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

impl Stored for Service {
    const KIND: &'static str = "Service";

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

impl Stored for Deployment {
    const KIND: &'static str = "Deployment";

    fn same_spec(&self, other: &Self) -> bool {
        self.spec == other.spec
    }

    fn copy_status_from(&mut self, other: &Self) {
        self.status.clone_from(&other.status);
    }
}

fn not_found(kind: &str, key: &ObjectKey) -> StoreError {
    StoreError::NotFound {
        kind: kind.to_string(),
        key: key.to_string(),
    }
}

fn check_version<K: Stored>(stored: &K, update: &K, key: &ObjectKey) -> StoreResult<()> {
    match update.resource_version() {
        Some(version) if Some(&version) != stored.meta().resource_version.as_ref() => {
            Err(StoreError::Conflict {
                kind: K::KIND.to_string(),
                key: key.to_string(),
                reason: format!(
                    "the object has been modified: resource version {version} is stale"
                ),
            })
        }
        _ => Ok(()),
    }
}

#[derive(Default)]
struct State {
    ingresses: BTreeMap<ObjectKey, Ingress>,
    services: BTreeMap<ObjectKey, Service>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    secrets: BTreeMap<ObjectKey, Secret>,
    dns_records: BTreeMap<ObjectKey, DNSRecord>,
    version: u64,
    writes: BTreeMap<&'static str, usize>,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }

    fn count(&mut self, operation: &'static str) {
        *self.writes.entry(operation).or_default() += 1;
    }
}

fn create<K: Stored>(
    objects: &mut BTreeMap<ObjectKey, K>,
    obj: &K,
    version: String,
) -> StoreResult<K> {
    let key = ObjectKey::from_resource(obj);
    if objects.contains_key(&key) {
        return Err(StoreError::AlreadyExists {
            kind: K::KIND.to_string(),
            key: key.to_string(),
        });
    }

    let mut created = obj.clone();
    let meta = created.meta_mut();
    meta.uid.get_or_insert_with(|| format!("uid-{version}"));
    meta.resource_version = Some(version);
    meta.generation = Some(1);
    meta.creation_timestamp = Some(Time(Timestamp::now()));
    meta.deletion_timestamp = None;
    objects.insert(key, created.clone());
    Ok(created)
}

fn update<K: Stored>(
    objects: &mut BTreeMap<ObjectKey, K>,
    obj: &K,
    version: String,
) -> StoreResult<K> {
    let key = ObjectKey::from_resource(obj);
    let stored = objects.get(&key).ok_or_else(|| not_found(K::KIND, &key))?;
    check_version(stored, obj, &key)?;

    let mut updated = obj.clone();
    updated.copy_status_from(stored);
    let bump = i64::from(!updated.same_spec(stored));
    let stored_meta = stored.meta().clone();
    let meta = updated.meta_mut();
    meta.uid = stored_meta.uid;
    meta.creation_timestamp = stored_meta.creation_timestamp;
    meta.deletion_timestamp = stored_meta.deletion_timestamp;
    meta.generation = Some(stored_meta.generation.unwrap_or(1) + bump);
    meta.resource_version = Some(version);

    if updated.meta().deletion_timestamp.is_some() && updated.finalizers().is_empty() {
        objects.remove(&key);
    } else {
        objects.insert(key, updated.clone());
    }
    Ok(updated)
}

fn update_status<K: Stored>(
    objects: &mut BTreeMap<ObjectKey, K>,
    obj: &K,
    version: String,
) -> StoreResult<K> {
    let key = ObjectKey::from_resource(obj);
    let stored = objects.get_mut(&key).ok_or_else(|| not_found(K::KIND, &key))?;
    check_version(stored, obj, &key)?;

    stored.copy_status_from(obj);
    stored.meta_mut().resource_version = Some(version);
    Ok(stored.clone())
}

fn delete<K: Stored>(
    objects: &mut BTreeMap<ObjectKey, K>,
    key: &ObjectKey,
    version: String,
) -> StoreResult<()> {
    let stored = objects.get_mut(key).ok_or_else(|| not_found(K::KIND, key))?;
    if stored.finalizers().is_empty() {
        objects.remove(key);
    } else {
        let meta = stored.meta_mut();
        meta.deletion_timestamp.get_or_insert_with(|| Time(Timestamp::now()));
        meta.resource_version = Some(version);
    }
    Ok(())
}

/// Thread-safe in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Seeding and inspection. None of these count as writes.
    // ------------------------------------------------------------------

    /// Insert an Ingress as if a user had created it.
    pub fn seed_ingress(&self, ingress: &Ingress) -> Ingress {
        let mut state = self.state();
        let version = state.next_version();
        let key = ObjectKey::from_resource(ingress);
        state.ingresses.remove(&key);
        let mut seeded = create(&mut state.ingresses, ingress, version)
            .unwrap_or_else(|_| ingress.clone());
        seeded.status.clone_from(&ingress.status);
        state.ingresses.insert(key, seeded.clone());
        seeded
    }

    pub fn seed_service(&self, service: &Service) {
        let key = ObjectKey::from_resource(service);
        self.state().services.insert(key, service.clone());
    }

    pub fn remove_service(&self, key: &ObjectKey) {
        self.state().services.remove(key);
    }

    pub fn seed_deployment(&self, deployment: &Deployment) {
        let key = ObjectKey::from_resource(deployment);
        self.state().deployments.insert(key, deployment.clone());
    }

    pub fn seed_secret(&self, secret: &Secret) {
        let key = ObjectKey::from_resource(secret);
        self.state().secrets.insert(key, secret.clone());
    }

    pub fn seed_dns_record(&self, record: &DNSRecord) -> DNSRecord {
        let mut state = self.state();
        let version = state.next_version();
        let key = ObjectKey::from_resource(record);
        state.dns_records.remove(&key);
        let mut seeded = create(&mut state.dns_records, record, version)
            .unwrap_or_else(|_| record.clone());
        seeded.status.clone_from(&record.status);
        state.dns_records.insert(key, seeded.clone());
        seeded
    }

    /// Set the load-balancer status of an Ingress, as the placement layer would.
    pub fn set_load_balancer(&self, key: &ObjectKey, entries: Vec<IngressLoadBalancerIngress>) {
        use crate::ingress_ext::IngressExt;

        let mut state = self.state();
        let version = state.next_version();
        if let Some(ingress) = state.ingresses.get_mut(key) {
            ingress.set_load_balancer_entries(entries);
            ingress.metadata.resource_version = Some(version);
        }
    }

    #[must_use]
    pub fn ingress(&self, key: &ObjectKey) -> Option<Ingress> {
        self.state().ingresses.get(key).cloned()
    }

    /// Names of every stored Ingress, sorted by key.
    #[must_use]
    pub fn ingress_names(&self) -> Vec<String> {
        self.state().ingresses.keys().map(|k| k.name.clone()).collect()
    }

    #[must_use]
    pub fn service(&self, key: &ObjectKey) -> Option<Service> {
        self.state().services.get(key).cloned()
    }

    /// Names of every stored Service, sorted by key.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.state().services.keys().map(|k| k.name.clone()).collect()
    }

    #[must_use]
    pub fn deployment(&self, key: &ObjectKey) -> Option<Deployment> {
        self.state().deployments.get(key).cloned()
    }

    /// Names of every stored Deployment, sorted by key.
    #[must_use]
    pub fn deployment_names(&self) -> Vec<String> {
        self.state().deployments.keys().map(|k| k.name.clone()).collect()
    }

    #[must_use]
    pub fn dns_record(&self, key: &ObjectKey) -> Option<DNSRecord> {
        self.state().dns_records.get(key).cloned()
    }

    #[must_use]
    pub fn has_secret(&self, key: &ObjectKey) -> bool {
        self.state().secrets.contains_key(key)
    }

    /// Writes performed through [`StateStore`] for one operation name.
    #[must_use]
    pub fn writes(&self, operation: &str) -> usize {
        self.state().writes.get(operation).copied().unwrap_or_default()
    }

    /// Writes performed through [`StateStore`] across all operations.
    #[must_use]
    pub fn total_writes(&self) -> usize {
        self.state().writes.values().sum()
    }

    pub fn reset_writes(&self) {
        self.state().writes.clear();
    }
}

#[async_trait::async_trait]
impl StateStore for MemoryStore {
    async fn get_ingress(&self, key: &ObjectKey) -> StoreResult<Ingress> {
        self.state()
            .ingresses
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(KIND_INGRESS, key))
    }

    async fn list_ingresses(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<Ingress>> {
        Ok(list_matching(&self.state().ingresses, cluster, namespace, selector))
    }

    async fn create_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        let mut state = self.state();
        let version = state.next_version();
        let mut created = create(&mut state.ingresses, ingress, version)?;
        // Status is a subresource and cannot be set on create.
        created.status = None;
        state
            .ingresses
            .insert(ObjectKey::from_resource(&created), created.clone());
        state.count("create_ingress");
        Ok(created)
    }

    async fn update_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update(&mut state.ingresses, ingress, version)?;
        state.count("update_ingress");
        Ok(updated)
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update_status(&mut state.ingresses, ingress, version)?;
        state.count("update_ingress_status");
        Ok(updated)
    }

    async fn patch_ingress_annotations(
        &self,
        key: &ObjectKey,
        annotations: &BTreeMap<String, String>,
    ) -> StoreResult<Ingress> {
        let mut state = self.state();
        let version = state.next_version();
        let ingress = state
            .ingresses
            .get_mut(key)
            .ok_or_else(|| not_found(KIND_INGRESS, key))?;
        ingress.annotations_mut().extend(annotations.clone());
        ingress.metadata.resource_version = Some(version);
        let patched = ingress.clone();
        state.count("patch_ingress_annotations");
        Ok(patched)
    }

    async fn delete_ingress(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut state = self.state();
        let version = state.next_version();
        delete(&mut state.ingresses, key, version)?;
        state.count("delete_ingress");
        Ok(())
    }

    async fn get_service(&self, key: &ObjectKey) -> StoreResult<Service> {
        self.state()
            .services
            .get(key)
            .cloned()
            .ok_or_else(|| not_found("Service", key))
    }

    async fn delete_secret(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut state = self.state();
        state
            .secrets
            .remove(key)
            .ok_or_else(|| not_found("Secret", key))?;
        state.count("delete_secret");
        Ok(())
    }

    async fn get_dns_record(&self, key: &ObjectKey) -> StoreResult<DNSRecord> {
        self.state()
            .dns_records
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(KIND_DNS_RECORD, key))
    }

    async fn create_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        let mut state = self.state();
        let version = state.next_version();
        let mut created = create(&mut state.dns_records, record, version)?;
        created.status = None;
        state
            .dns_records
            .insert(ObjectKey::from_resource(&created), created.clone());
        state.count("create_dns_record");
        Ok(created)
    }

    async fn patch_dns_record_spec(
        &self,
        key: &ObjectKey,
        spec: &DNSRecordSpec,
    ) -> StoreResult<DNSRecord> {
        let mut state = self.state();
        let version = state.next_version();
        let record = state
            .dns_records
            .get_mut(key)
            .ok_or_else(|| not_found(KIND_DNS_RECORD, key))?;
        if &record.spec != spec {
            record.spec = spec.clone();
            record.metadata.generation = Some(record.metadata.generation.unwrap_or(1) + 1);
        }
        record.metadata.resource_version = Some(version);
        let patched = record.clone();
        state.count("patch_dns_record_spec");
        Ok(patched)
    }

    async fn update_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update(&mut state.dns_records, record, version)?;
        state.count("update_dns_record");
        Ok(updated)
    }

    async fn update_dns_record_status(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update_status(&mut state.dns_records, record, version)?;
        state.count("update_dns_record_status");
        Ok(updated)
    }

    async fn delete_dns_record(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut state = self.state();
        let version = state.next_version();
        delete(&mut state.dns_records, key, version)?;
        state.count("delete_dns_record");
        Ok(())
    }
}

fn list_matching<K: Stored>(
    objects: &BTreeMap<ObjectKey, K>,
    cluster: &str,
    namespace: &str,
    selector: &BTreeMap<String, String>,
) -> Vec<K> {
    objects
        .iter()
        .filter(|(key, _)| key.cluster == cluster && key.namespace == namespace)
        .filter(|(_, obj)| selector.iter().all(|(k, v)| obj.labels().get(k) == Some(v)))
        .map(|(_, obj)| obj.clone())
        .collect()
}

#[async_trait::async_trait]
impl ObjectStore<Service> for MemoryStore {
    async fn get_object(&self, key: &ObjectKey) -> StoreResult<Service> {
        self.get_service(key).await
    }

    async fn list_objects(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<Service>> {
        Ok(list_matching(&self.state().services, cluster, namespace, selector))
    }

    async fn create_object(&self, obj: &Service) -> StoreResult<Service> {
        let mut state = self.state();
        let version = state.next_version();
        let created = create(&mut state.services, obj, version)?;
        state.count("create_service");
        Ok(created)
    }

    async fn update_object(&self, obj: &Service) -> StoreResult<Service> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update(&mut state.services, obj, version)?;
        state.count("update_service");
        Ok(updated)
    }

    async fn delete_object(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut state = self.state();
        let version = state.next_version();
        delete(&mut state.services, key, version)?;
        state.count("delete_service");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ObjectStore<Deployment> for MemoryStore {
    async fn get_object(&self, key: &ObjectKey) -> StoreResult<Deployment> {
        self.state()
            .deployments
            .get(key)
            .cloned()
            .ok_or_else(|| not_found(<Deployment as Stored>::KIND, key))
    }

    async fn list_objects(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<Deployment>> {
        Ok(list_matching(&self.state().deployments, cluster, namespace, selector))
    }

    async fn create_object(&self, obj: &Deployment) -> StoreResult<Deployment> {
        let mut state = self.state();
        let version = state.next_version();
        let created = create(&mut state.deployments, obj, version)?;
        state.count("create_deployment");
        Ok(created)
    }

    async fn update_object(&self, obj: &Deployment) -> StoreResult<Deployment> {
        let mut state = self.state();
        let version = state.next_version();
        let updated = update(&mut state.deployments, obj, version)?;
        state.count("update_deployment");
        Ok(updated)
    }

    async fn delete_object(&self, key: &ObjectKey) -> StoreResult<()> {
        let mut state = self.state();
        let version = state.next_version();
        delete(&mut state.deployments, key, version)?;
        state.count("delete_deployment");
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
