// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::labels::PLACEMENT_ANNOTATION;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::core::v1::{PodTemplateSpec, ServiceSpec};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn meta(name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        }
    }

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("", "default", name)
    }

    fn root_ref(name: &str) -> ObjectRef<Ingress> {
        ObjectRef::new(name).within("default")
    }

    #[test]
    fn test_root_event_has_no_owner() {
        let ingress = Ingress {
            metadata: meta("web", &[]),
            ..Default::default()
        };
        assert_eq!(leaf_owner_refs(&ingress), None);
    }

    #[test]
    fn test_leaf_event_triggers_root() {
        let ingress = Ingress {
            metadata: meta("web--east", &[(OWNED_BY_LABEL, "web")]),
            ..Default::default()
        };
        assert_eq!(leaf_owner_refs(&ingress), Some(root_ref("web")));
    }

    #[test]
    fn test_service_event_triggers_tracked_ingresses() {
        let tracker = Tracker::new();
        tracker.track(&key("web"), &key("backend"));
        tracker.track(&key("api"), &key("backend"));
        let service = Service {
            metadata: meta("backend", &[]),
            ..Default::default()
        };
        let unknown = Service {
            metadata: meta("other", &[]),
            ..Default::default()
        };

        assert_eq!(
            service_dependents(&tracker, &service),
            vec![root_ref("api"), root_ref("web")]
        );
        assert!(service_dependents(&tracker, &unknown).is_empty());
    }

    #[test]
    fn test_untracked_ingress_stops_receiving_service_events() {
        let tracker = Tracker::new();
        tracker.track(&key("web"), &key("backend"));
        tracker.untrack(&key("web"));
        let service = Service {
            metadata: meta("backend", &[]),
            ..Default::default()
        };

        assert!(service_dependents(&tracker, &service).is_empty());
    }

    fn pairs(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn deployment(name: &str, labels: &[(&str, &str)], app: &str) -> Arc<Deployment> {
        Arc::new(Deployment {
            metadata: meta(name, labels),
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(pairs(&[("app", app)])),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn selecting_service(name: &str, labels: &[(&str, &str)]) -> Service {
        let mut metadata = meta(name, labels);
        metadata.annotations = Some(pairs(&[(PLACEMENT_ANNOTATION, "east")]));
        Service {
            metadata,
            spec: Some(ServiceSpec {
                selector: Some(pairs(&[("app", "web")])),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_shadow_event_triggers_root() {
        let shadow = selecting_service("web--east", &[(OWNED_BY_LABEL, "web")]);
        let root = selecting_service("web", &[]);

        assert_eq!(
            shadow_owner_ref(&shadow),
            Some(ObjectRef::<Service>::new("web").within("default"))
        );
        assert_eq!(shadow_owner_ref(&root), None);
    }

    #[test]
    fn test_service_event_triggers_selected_root_deployments() {
        let deployments = vec![
            deployment("web", &[], "web"),
            deployment("web--east", &[(OWNED_BY_LABEL, "web")], "web"),
            deployment("api", &[], "api"),
        ];

        assert_eq!(
            selected_deployments(&deployments, &selecting_service("web", &[])),
            vec![ObjectRef::<Deployment>::new("web").within("default")]
        );
        let shadow = selecting_service("web--east", &[(OWNED_BY_LABEL, "web")]);
        assert!(selected_deployments(&deployments, &shadow).is_empty());
    }
}
