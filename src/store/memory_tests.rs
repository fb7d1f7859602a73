// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::RecordType;
    use crate::store::{ignore_not_found, optional};
    use serde_json::json;

    fn ingress(name: &str, labels: serde_json::Value) -> Ingress {
        serde_json::from_value(json!({
            "metadata": {"name": name, "namespace": "default", "labels": labels},
            "spec": {"rules": [{"host": "a.example.com"}]}
        }))
        .unwrap()
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("", "default", name)
    }

    #[tokio::test]
    async fn test_create_assigns_metadata_and_rejects_duplicates() {
        let store = MemoryStore::new();
        let created = store.create_ingress(&ingress("web", json!({}))).await.unwrap();

        assert!(created.metadata.resource_version.is_some());
        assert!(created.metadata.uid.is_some());
        assert_eq!(created.metadata.generation, Some(1));

        let err = store.create_ingress(&ingress("web", json!({}))).await.unwrap_err();
        assert!(err.is_already_exists());
        assert_eq!(store.writes("create_ingress"), 1);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let store = MemoryStore::new();
        let created = store.create_ingress(&ingress("web", json!({}))).await.unwrap();

        let mut first = created.clone();
        first.labels_mut().insert("a".into(), "1".into());
        store.update_ingress(&first).await.unwrap();

        let mut second = created;
        second.labels_mut().insert("b".into(), "2".into());
        let err = store.update_ingress(&second).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_spec_change_bumps_generation() {
        let store = MemoryStore::new();
        let created = store.create_ingress(&ingress("web", json!({}))).await.unwrap();

        let mut relabeled = created.clone();
        relabeled.labels_mut().insert("a".into(), "1".into());
        let relabeled = store.update_ingress(&relabeled).await.unwrap();
        assert_eq!(relabeled.metadata.generation, Some(1));

        let mut respecced = relabeled;
        respecced.spec.as_mut().unwrap().rules = None;
        let respecced = store.update_ingress(&respecced).await.unwrap();
        assert_eq!(respecced.metadata.generation, Some(2));
    }

    #[tokio::test]
    async fn test_update_ignores_status_and_status_update_ignores_spec() {
        let store = MemoryStore::new();
        let created = store.create_ingress(&ingress("web", json!({}))).await.unwrap();

        let mut with_status = created.clone();
        with_status.status = Some(Default::default());
        let updated = store.update_ingress(&with_status).await.unwrap();
        assert!(updated.status.is_none());

        let mut status_only = updated;
        status_only.spec = None;
        status_only.status = Some(Default::default());
        let stored = store.update_ingress_status(&status_only).await.unwrap();
        assert!(stored.spec.is_some());
        assert!(stored.status.is_some());
    }

    #[tokio::test]
    async fn test_deletion_timestamp_follows_creation_and_is_kept() {
        let store = MemoryStore::new();
        let mut ing = ingress("web", json!({}));
        ing.metadata.finalizers = Some(vec!["kcp.dev/cascade-cleanup".to_string()]);
        let created = store.create_ingress(&ing).await.unwrap();
        let Some(Time(created_at)) = created.metadata.creation_timestamp else {
            panic!("creation timestamp not set");
        };

        store.delete_ingress(&key("web")).await.unwrap();
        let first = store.ingress(&key("web")).unwrap().metadata.deletion_timestamp;
        store.delete_ingress(&key("web")).await.unwrap();
        let second = store.ingress(&key("web")).unwrap().metadata.deletion_timestamp;

        let Some(Time(deleted_at)) = first else {
            panic!("deletion timestamp not set");
        };
        assert!(deleted_at >= created_at);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_delete_with_finalizers_marks_then_removes() {
        let store = MemoryStore::new();
        let mut ing = ingress("web", json!({}));
        ing.metadata.finalizers = Some(vec!["kcp.dev/cascade-cleanup".to_string()]);
        store.create_ingress(&ing).await.unwrap();

        store.delete_ingress(&key("web")).await.unwrap();
        let marked = store.ingress(&key("web")).unwrap();
        assert!(marked.metadata.deletion_timestamp.is_some());

        let mut released = marked;
        released.metadata.finalizers = Some(Vec::new());
        store.update_ingress(&released).await.unwrap();
        assert!(store.ingress(&key("web")).is_none());

        let err = store.delete_ingress(&key("web")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(ignore_not_found(Err(err)).is_ok());
    }

    #[tokio::test]
    async fn test_list_by_selector() {
        let store = MemoryStore::new();
        store.seed_ingress(&ingress("web", json!({})));
        store.seed_ingress(&ingress("web--east", json!({"kcp.dev/owned-by": "web"})));
        store.seed_ingress(&ingress("web--west", json!({"kcp.dev/owned-by": "web"})));
        store.seed_ingress(&ingress("api--east", json!({"kcp.dev/owned-by": "api"})));

        let selector = BTreeMap::from([("kcp.dev/owned-by".to_string(), "web".to_string())]);
        let names: Vec<String> = store
            .list_ingresses("", "default", &selector)
            .await
            .unwrap()
            .iter()
            .map(ResourceExt::name_any)
            .collect();
        assert_eq!(names, vec!["web--east", "web--west"]);

        assert!(store
            .list_ingresses("other", "default", &selector)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.total_writes(), 0);
    }

    #[tokio::test]
    async fn test_patch_annotations_merges() {
        let store = MemoryStore::new();
        let mut ing = ingress("web", json!({}));
        ing.metadata.annotations = Some(BTreeMap::from([("keep".to_string(), "me".to_string())]));
        let seeded = store.seed_ingress(&ing);

        let patched = store
            .patch_ingress_annotations(
                &key("web"),
                &BTreeMap::from([("new".to_string(), "value".to_string())]),
            )
            .await
            .unwrap();

        assert_eq!(patched.annotations().len(), 2);
        assert_ne!(patched.metadata.resource_version, seeded.metadata.resource_version);
    }

    #[tokio::test]
    async fn test_dns_record_spec_patch() {
        let store = MemoryStore::new();
        let mut record = DNSRecord::new(
            "web",
            DNSRecordSpec {
                dns_name: "abc.hcpapps.net".to_string(),
                targets: vec!["192.0.2.1".to_string()],
                record_type: RecordType::A,
                record_ttl: 60,
            },
        );
        record.metadata.namespace = Some("default".to_string());
        store.create_dns_record(&record).await.unwrap();

        let same = store
            .patch_dns_record_spec(&key("web"), &record.spec)
            .await
            .unwrap();
        assert_eq!(same.metadata.generation, Some(1));

        let mut spec = record.spec.clone();
        spec.targets.push("192.0.2.2".to_string());
        let changed = store.patch_dns_record_spec(&key("web"), &spec).await.unwrap();
        assert_eq!(changed.metadata.generation, Some(2));
        assert_eq!(store.writes("patch_dns_record_spec"), 2);

        assert!(optional(store.get_dns_record(&key("missing")).await)
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_secrets() {
        let store = MemoryStore::new();
        let mut secret = Secret::default();
        secret.metadata.name = Some("web--east-tls".to_string());
        secret.metadata.namespace = Some("default".to_string());
        store.seed_secret(&secret);

        assert!(store.has_secret(&key("web--east-tls")));
        store.delete_secret(&key("web--east-tls")).await.unwrap();
        assert!(!store.has_secret(&key("web--east-tls")));
        assert!(store.delete_secret(&key("web--east-tls")).await.unwrap_err().is_not_found());
    }
}
