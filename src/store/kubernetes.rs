// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! [`StateStore`] backed by the Kubernetes API.

use super::retry::retry_api_call;
use super::{ObjectStore, StateStore, StoreResult};
use crate::constants::{KIND_DNS_RECORD, KIND_INGRESS};
use crate::crd::{DNSRecord, DNSRecordSpec};
use crate::errors::StoreError;
use crate::key::ObjectKey;
use crate::labels::FIELD_MANAGER;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Render a label selector as `k1=v1,k2=v2`.
#[must_use]
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Store talking to the API server through `kube`.
///
/// A plain Kubernetes cluster has no logical clusters; the cluster component of
/// keys is matched against the `kcp.dev/logical-cluster` annotation on lists.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        }
    }

    async fn get<K>(&self, kind: &str, key: &ObjectKey) -> StoreResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(&key.namespace);
        retry_api_call(|| api.get(&key.name), &format!("get {kind} {key}"))
            .await
            .map_err(|e| StoreError::from_kube(e, kind, &key.to_string()))
    }

    async fn delete<K>(&self, kind: &str, key: &ObjectKey) -> StoreResult<()>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(&key.namespace);
        let dp = DeleteParams::default();
        retry_api_call(|| api.delete(&key.name, &dp), &format!("delete {kind} {key}"))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, kind, &key.to_string()))
    }

    /// List `namespace` by label, keeping the objects of logical cluster `cluster`.
    async fn list<K>(
        &self,
        kind: &str,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<K>>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let api: Api<K> = self.api(namespace);
        let lp = ListParams::default().labels(&selector_string(selector));
        let list = retry_api_call(|| api.list(&lp), &format!("list {kind} in {namespace}"))
            .await
            .map_err(|e| StoreError::from_kube(e, kind, namespace))?;

        Ok(list
            .items
            .into_iter()
            .filter(|obj| ObjectKey::from_resource(obj).cluster == cluster)
            .collect())
    }

    async fn create<K>(&self, kind: &str, obj: &K) -> StoreResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let key = ObjectKey::from_resource(obj);
        let api: Api<K> = self.api(&key.namespace);
        let pp = Self::post_params();
        retry_api_call(|| api.create(&pp, obj), &format!("create {kind} {key}"))
            .await
            .map_err(|e| StoreError::from_kube(e, kind, &key.to_string()))
    }

    async fn replace<K>(&self, kind: &str, obj: &K) -> StoreResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let key = ObjectKey::from_resource(obj);
        let api: Api<K> = self.api(&key.namespace);
        let pp = Self::post_params();
        retry_api_call(
            || api.replace(&key.name, &pp, obj),
            &format!("update {kind} {key}"),
        )
        .await
        .map_err(|e| StoreError::from_kube(e, kind, &key.to_string()))
    }

    /// Merge-patch `status` guarded by the object's resource version.
    async fn patch_status<K>(
        &self,
        kind: &str,
        obj: &K,
        status: serde_json::Value,
    ) -> StoreResult<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
        <K as Resource>::DynamicType: Default,
    {
        let key = ObjectKey::from_resource(obj);
        let api: Api<K> = self.api(&key.namespace);
        let patch = Patch::Merge(json!({
            "metadata": { "resourceVersion": obj.resource_version() },
            "status": status,
        }));
        let pp = Self::patch_params();
        retry_api_call(
            || api.patch_status(&key.name, &pp, &patch),
            &format!("update {kind} status {key}"),
        )
        .await
        .map_err(|e| StoreError::from_kube(e, kind, &key.to_string()))
    }
}

fn to_value<T: serde::Serialize>(kind: &str, key: &ObjectKey, value: &T) -> StoreResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|source| StoreError::Serialization {
        kind: kind.to_string(),
        key: key.to_string(),
        source,
    })
}

#[async_trait::async_trait]
impl StateStore for KubeStore {
    async fn get_ingress(&self, key: &ObjectKey) -> StoreResult<Ingress> {
        self.get(KIND_INGRESS, key).await
    }

    async fn list_ingresses(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<Ingress>> {
        self.list(KIND_INGRESS, cluster, namespace, selector).await
    }

    async fn create_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        self.create(KIND_INGRESS, ingress).await
    }

    async fn update_ingress(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        self.replace(KIND_INGRESS, ingress).await
    }

    async fn update_ingress_status(&self, ingress: &Ingress) -> StoreResult<Ingress> {
        let key = ObjectKey::from_resource(ingress);
        let status = to_value(KIND_INGRESS, &key, &ingress.status)?;
        self.patch_status(KIND_INGRESS, ingress, status).await
    }

    async fn patch_ingress_annotations(
        &self,
        key: &ObjectKey,
        annotations: &BTreeMap<String, String>,
    ) -> StoreResult<Ingress> {
        let api: Api<Ingress> = self.api(&key.namespace);
        let patch = Patch::Merge(json!({ "metadata": { "annotations": annotations } }));
        let pp = Self::patch_params();
        retry_api_call(
            || api.patch(&key.name, &pp, &patch),
            &format!("patch {KIND_INGRESS} annotations {key}"),
        )
        .await
        .map_err(|e| StoreError::from_kube(e, KIND_INGRESS, &key.to_string()))
    }

    async fn delete_ingress(&self, key: &ObjectKey) -> StoreResult<()> {
        self.delete::<Ingress>(KIND_INGRESS, key).await
    }

    async fn get_service(&self, key: &ObjectKey) -> StoreResult<Service> {
        self.get("Service", key).await
    }

    async fn delete_secret(&self, key: &ObjectKey) -> StoreResult<()> {
        self.delete::<Secret>("Secret", key).await
    }

    async fn get_dns_record(&self, key: &ObjectKey) -> StoreResult<DNSRecord> {
        self.get(KIND_DNS_RECORD, key).await
    }

    async fn create_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        self.create(KIND_DNS_RECORD, record).await
    }

    async fn patch_dns_record_spec(
        &self,
        key: &ObjectKey,
        spec: &DNSRecordSpec,
    ) -> StoreResult<DNSRecord> {
        let api: Api<DNSRecord> = self.api(&key.namespace);
        let patch = Patch::Merge(json!({ "spec": to_value(KIND_DNS_RECORD, key, spec)? }));
        let pp = Self::patch_params();
        retry_api_call(
            || api.patch(&key.name, &pp, &patch),
            &format!("patch {KIND_DNS_RECORD} spec {key}"),
        )
        .await
        .map_err(|e| StoreError::from_kube(e, KIND_DNS_RECORD, &key.to_string()))
    }

    async fn update_dns_record(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        self.replace(KIND_DNS_RECORD, record).await
    }

    async fn update_dns_record_status(&self, record: &DNSRecord) -> StoreResult<DNSRecord> {
        let key = ObjectKey::from_resource(record);
        let status = to_value(KIND_DNS_RECORD, &key, &record.status)?;
        self.patch_status(KIND_DNS_RECORD, record, status).await
    }

    async fn delete_dns_record(&self, key: &ObjectKey) -> StoreResult<()> {
        self.delete::<DNSRecord>(KIND_DNS_RECORD, key).await
    }
}

#[async_trait::async_trait]
impl<K> ObjectStore<K> for KubeStore
where
    K: Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + Clone
        + DeserializeOwned
        + Serialize
        + Debug
        + Send
        + Sync
        + 'static,
{
    async fn get_object(&self, key: &ObjectKey) -> StoreResult<K> {
        self.get(&K::kind(&()), key).await
    }

    async fn list_objects(
        &self,
        cluster: &str,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> StoreResult<Vec<K>> {
        self.list(&K::kind(&()), cluster, namespace, selector).await
    }

    async fn create_object(&self, obj: &K) -> StoreResult<K> {
        self.create(&K::kind(&()), obj).await
    }

    async fn update_object(&self, obj: &K) -> StoreResult<K> {
        self.replace(&K::kind(&()), obj).await
    }

    async fn delete_object(&self, key: &ObjectKey) -> StoreResult<()> {
        self.delete::<K>(&K::kind(&()), key).await
    }
}

#[cfg(test)]
#[path = "kubernetes_tests.rs"]
mod kubernetes_tests;
