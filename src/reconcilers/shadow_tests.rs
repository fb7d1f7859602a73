// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `shadow.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::labels::{AWAITING_DELETE_FINALIZER, DELETE_AT_ANNOTATION};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PodTemplateSpec, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
    use std::time::Duration;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("", "default", name)
    }

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn service(name: &str, placement: Option<&str>) -> Service {
        Service {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                annotations: placement
                    .map(|value| labels(&[(PLACEMENT_ANNOTATION, value)])),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(labels(&[("app", "web")])),
                cluster_ip: Some("10.96.0.10".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn deployment(name: &str, pod_labels: &[(&str, &str)]) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                selector: LabelSelector {
                    match_labels: Some(labels(pod_labels)),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels(pod_labels)),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    struct Harness {
        store: Arc<MemoryStore>,
        services: Arc<dyn ObjectStore<Service>>,
        reconciler: ServiceShadowReconciler,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        let services: Arc<dyn ObjectStore<Service>> = store.clone();
        Harness {
            reconciler: ServiceShadowReconciler::new(Arc::clone(&services)),
            store,
            services,
        }
    }

    impl Harness {
        async fn split(&self, placement: &str) {
            self.store.seed_service(&service("web", Some(placement)));
            self.reconciler.process(&key("web")).await.unwrap();
        }

        async fn place(&self, placement: Option<&str>) {
            let mut root = self.store.service(&key("web")).unwrap();
            match placement {
                Some(value) => {
                    root.annotations_mut()
                        .insert(PLACEMENT_ANNOTATION.to_string(), value.to_string());
                }
                None => {
                    root.annotations_mut().remove(PLACEMENT_ANNOTATION);
                }
            }
            self.services.update_object(&root).await.unwrap();
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_placement_trims_and_dedupes() {
        let svc = service("web", Some(" west,east,, east "));
        assert_eq!(placement(&svc), vec!["east", "west"]);
        assert!(placement(&service("web", None)).is_empty());
    }

    #[test]
    fn test_build_shadow_strips_root_state() {
        let mut root = service("web", Some("east"));
        root.metadata.resource_version = Some("7".to_string());
        root.metadata.uid = Some("uid-1".to_string());
        root.finalizers_mut().push(SHADOW_CLEANUP_FINALIZER.to_string());

        let shadow = build_shadow(&root, "east");

        assert_eq!(shadow.name_any(), "web--east");
        assert_eq!(shadow.labels().get(CLUSTER_LABEL).map(String::as_str), Some("east"));
        assert_eq!(shadow.labels().get(OWNED_BY_LABEL).map(String::as_str), Some("web"));
        assert!(!shadow.annotations().contains_key(PLACEMENT_ANNOTATION));
        assert!(shadow.finalizers().is_empty());
        assert_eq!(shadow.metadata.resource_version, None);
        assert_eq!(shadow.metadata.uid, None);
        assert_eq!(shadow.spec.as_ref().unwrap().cluster_ip, None);
    }

    #[test]
    fn test_selects_needs_a_matching_selector() {
        let web = deployment("web", &[("app", "web"), ("tier", "front")]);
        let api = deployment("api", &[("app", "api")]);
        let mut open = service("open", Some("east"));
        open.spec.as_mut().unwrap().selector = None;

        assert!(selects(&service("web", Some("east")), &web));
        assert!(!selects(&service("web", Some("east")), &api));
        assert!(!selects(&open, &web));
    }

    #[test]
    fn test_deployment_locations_union_of_selecting_roots() {
        let web = deployment("web", &[("app", "web")]);
        let mut shadow = build_shadow(&service("web", Some("north")), "north");
        shadow
            .annotations_mut()
            .insert(PLACEMENT_ANNOTATION.to_string(), "south".to_string());
        let services = vec![
            service("web", Some("east")),
            service("web-internal", Some("west,east")),
            shadow,
        ];

        assert_eq!(deployment_locations(&web, &services), vec!["east", "west"]);
    }

    #[tokio::test]
    async fn test_placed_service_is_split_into_shadows() {
        let h = harness();
        h.split("east,west").await;

        assert_eq!(h.store.service_names(), vec!["web", "web--east", "web--west"]);
        let root = h.store.service(&key("web")).unwrap();
        assert!(has_finalizer(&root, SHADOW_CLEANUP_FINALIZER));

        let east = h.store.service(&key("web--east")).unwrap();
        assert_eq!(east.labels().get(CLUSTER_LABEL).map(String::as_str), Some("east"));
        assert_eq!(east.labels().get(OWNED_BY_LABEL).map(String::as_str), Some("web"));
        assert!(east.finalizers().is_empty());
        assert_eq!(h.store.writes("create_service"), 2);
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let h = harness();
        h.split("east,west").await;
        h.store.reset_writes();

        let action = h.reconciler.process(&key("web")).await.unwrap();

        assert_eq!(action, Action::await_change());
        assert_eq!(h.store.total_writes(), 0);
    }

    #[tokio::test]
    async fn test_unplaced_service_is_left_alone() {
        let h = harness();
        h.store.seed_service(&service("web", None));

        h.reconciler.process(&key("web")).await.unwrap();

        assert_eq!(h.store.service_names(), vec!["web"]);
        assert_eq!(h.store.total_writes(), 0);
    }

    #[tokio::test]
    async fn test_removed_location_schedules_shadow_removal() {
        let h = harness();
        h.split("east,west").await;
        h.place(Some("east")).await;
        let before = Utc::now().timestamp();

        h.reconciler.process(&key("web")).await.unwrap();

        let west = h.store.service(&key("web--west")).unwrap();
        assert!(is_deleting(&west));
        assert!(has_finalizer(&west, AWAITING_DELETE_FINALIZER));
        let delete_at: i64 = west.annotations()[DELETE_AT_ANNOTATION].parse().unwrap();
        assert!(delete_at >= before + 120);
        assert!(!is_deleting(&h.store.service(&key("web--east")).unwrap()));
        assert_eq!(h.store.writes("delete_service"), 1);
    }

    #[tokio::test]
    async fn test_deleting_shadow_is_held_until_delete_at() {
        let h = harness();
        h.split("east,west").await;
        h.place(Some("east")).await;
        h.reconciler.process(&key("web")).await.unwrap();

        let west = h.store.service(&key("web--west")).unwrap();
        let delete_at: i64 = west.annotations()[DELETE_AT_ANNOTATION].parse().unwrap();

        let early = release_shadow(&*h.services, &key("web--west"), &west, at(delete_at - 30))
            .await
            .unwrap();
        assert_eq!(early, Action::requeue(Duration::from_secs(30)));
        assert!(h.store.service(&key("web--west")).is_some());

        let due = release_shadow(&*h.services, &key("web--west"), &west, at(delete_at + 1))
            .await
            .unwrap();
        assert_eq!(due, Action::await_change());
        assert!(h.store.service(&key("web--west")).is_none());
    }

    #[tokio::test]
    async fn test_fresh_shadow_under_deletion_waits_for_ttl() {
        let h = harness();
        h.split("east,west").await;
        h.place(Some("east")).await;
        h.reconciler.process(&key("web")).await.unwrap();

        let action = h.reconciler.process(&key("web--west")).await.unwrap();

        assert_ne!(action, Action::await_change());
        assert!(h.store.service(&key("web--west")).is_some());
    }

    #[tokio::test]
    async fn test_service_without_locations_releases_finalizer() {
        let h = harness();
        h.split("east").await;
        h.place(None).await;

        h.reconciler.process(&key("web")).await.unwrap();

        let root = h.store.service(&key("web")).unwrap();
        assert!(!has_finalizer(&root, SHADOW_CLEANUP_FINALIZER));
        assert!(is_deleting(&h.store.service(&key("web--east")).unwrap()));
    }

    #[tokio::test]
    async fn test_deleting_root_removes_shadows_and_releases_it() {
        let h = harness();
        h.split("east,west").await;
        h.place(Some("east")).await;
        h.reconciler.process(&key("web")).await.unwrap();
        h.services.delete_object(&key("web")).await.unwrap();

        h.reconciler.process(&key("web")).await.unwrap();

        assert!(h.store.service_names().is_empty());
    }

    #[tokio::test]
    async fn test_deployment_follows_selecting_services() {
        let store = Arc::new(MemoryStore::new());
        let services: Arc<dyn ObjectStore<Service>> = store.clone();
        let deployments: Arc<dyn ObjectStore<Deployment>> = store.clone();
        let reconciler = DeploymentShadowReconciler::new(Arc::clone(&deployments), services);
        store.seed_service(&service("web", Some("east,west")));
        store.seed_deployment(&deployment("web", &[("app", "web")]));
        store.seed_deployment(&deployment("api", &[("app", "api")]));

        reconciler.process(&key("web")).await.unwrap();
        reconciler.process(&key("api")).await.unwrap();

        assert_eq!(store.deployment_names(), vec!["api", "web", "web--east", "web--west"]);
        let east = store.deployment(&key("web--east")).unwrap();
        assert_eq!(east.labels().get(CLUSTER_LABEL).map(String::as_str), Some("east"));
        assert!(has_finalizer(
            &store.deployment(&key("web")).unwrap(),
            SHADOW_CLEANUP_FINALIZER
        ));

        store.reset_writes();
        reconciler.process(&key("web")).await.unwrap();
        assert_eq!(store.total_writes(), 0);
    }
}
