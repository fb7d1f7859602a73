// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::crd::{DNSRecordSpec, DNSRecordStatus, RecordType};
    use crate::dns::FakeProvider;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn zone(id: &str) -> DNSZone {
        DNSZone {
            id: id.to_string(),
            tags: Default::default(),
        }
    }

    fn record(generation: i64) -> DNSRecord {
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
        record.metadata.generation = Some(generation);
        record
    }

    fn observe(record: &mut DNSRecord, zones: Vec<DNSZoneStatus>) {
        record.status = Some(DNSRecordStatus {
            zones,
            observed_generation: record.metadata.generation,
        });
    }

    /// Fails `ensure`/`delete` for the listed zone ids.
    #[derive(Default)]
    struct FlakyProvider {
        failing: Mutex<HashSet<String>>,
        ensure_calls: AtomicUsize,
        delete_calls: AtomicUsize,
    }

    impl FlakyProvider {
        fn failing(ids: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                failing: Mutex::new(ids.iter().map(|s| (*s).to_string()).collect()),
                ..Self::default()
            })
        }

        fn outcome(&self, zone: &DNSZone) -> Result<(), ProviderError> {
            if self.failing.lock().unwrap().contains(&zone.id) {
                Err(ProviderError::Transport {
                    server: "192.0.2.53:53".to_string(),
                    reason: "timed out".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait::async_trait]
    impl Provider for FlakyProvider {
        async fn ensure(&self, _record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            self.outcome(zone)
        }

        async fn delete(&self, _record: &DNSRecord, zone: &DNSZone) -> Result<(), ProviderError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            self.outcome(zone)
        }
    }

    #[tokio::test]
    async fn test_publish_twice_calls_provider_once() {
        let provider = Arc::new(FakeProvider::new());
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("hcpapps.net")];
        let mut rec = record(1);

        let first = publisher.publish_to_zones(&zones, &rec).await;
        assert_eq!(provider.ensure_calls(), 1);
        assert!(is_published(&first, &zones[0]));
        observe(&mut rec, first.clone());

        let second = publisher.publish_to_zones(&zones, &rec).await;
        assert_eq!(provider.ensure_calls(), 1);
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_generation_change_republishes_with_replace_message() {
        let provider = Arc::new(FakeProvider::new());
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("hcpapps.net")];
        let mut rec = record(1);

        let first = publisher.publish_to_zones(&zones, &rec).await;
        observe(&mut rec, first);
        rec.metadata.generation = Some(2);

        let second = publisher.publish_to_zones(&zones, &rec).await;
        assert_eq!(provider.ensure_calls(), 2);
        let condition = zone_condition(&second, &zones[0]).unwrap();
        assert_eq!(condition.status, "False");
        assert_eq!(
            condition.message.as_deref(),
            Some("The DNS provider succeeded in replacing the record")
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_recorded_not_propagated() {
        let provider = FlakyProvider::failing(&["bad.net"]);
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("bad.net"), zone("good.net")];

        let statuses = publisher.publish_to_zones(&zones, &record(1)).await;

        assert_eq!(provider.ensure_calls.load(Ordering::SeqCst), 2);
        let bad = zone_condition(&statuses, &zones[0]).unwrap();
        assert_eq!(bad.status, "True");
        assert_eq!(bad.reason.as_deref(), Some(REASON_PROVIDER_ERROR));
        assert!(bad
            .message
            .as_deref()
            .unwrap()
            .starts_with("The DNS provider failed to ensure the record: "));
        assert!(is_published(&statuses, &zones[1]));
    }

    #[tokio::test]
    async fn test_failed_zone_is_retried_even_when_generation_observed() {
        let provider = FlakyProvider::failing(&["bad.net"]);
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("bad.net"), zone("good.net")];
        let mut rec = record(1);

        let first = publisher.publish_to_zones(&zones, &rec).await;
        observe(&mut rec, first);
        provider.failing.lock().unwrap().clear();

        let second = publisher.publish_to_zones(&zones, &rec).await;
        // Only the failed zone is retried.
        assert_eq!(provider.ensure_calls.load(Ordering::SeqCst), 3);
        assert!(is_published(&second, &zones[0]));
    }

    #[tokio::test]
    async fn test_delete_attempts_every_published_zone() {
        let provider = FlakyProvider::failing(&["a.net"]);
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("a.net"), zone("b.net"), zone("c.net")];
        let mut rec = record(1);

        provider.failing.lock().unwrap().clear();
        let statuses = publisher.publish_to_zones(&zones, &rec).await;
        observe(&mut rec, statuses);
        provider
            .failing
            .lock()
            .unwrap()
            .insert("a.net".to_string());

        let err = publisher.delete_record(&rec).await.unwrap_err();
        assert_eq!(provider.delete_calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.0.len(), 1);
        assert_eq!(err.0[0].0, zones[0]);
        assert!(err.to_string().contains("zone a.net"));
    }

    #[tokio::test]
    async fn test_delete_skips_unpublished_zones() {
        let provider = FlakyProvider::failing(&["a.net"]);
        let publisher = ZonePublisher::new(provider.clone());
        let zones = vec![zone("a.net"), zone("b.net")];
        let mut rec = record(1);

        let statuses = publisher.publish_to_zones(&zones, &rec).await;
        observe(&mut rec, statuses);

        publisher.delete_record(&rec).await.unwrap();
        assert_eq!(provider.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_statuses_appends_unknown_zones() {
        let existing = vec![DNSZoneStatus {
            dns_zone: zone("a.net"),
            conditions: vec![create_condition("Failed", "False", "ProviderSuccess", "ok")],
        }];
        let merged = merge_statuses(
            &existing,
            vec![DNSZoneStatus {
                dns_zone: zone("b.net"),
                conditions: vec![create_condition("Failed", "True", "ProviderError", "no")],
            }],
        );

        assert_eq!(merged.len(), 2);
        assert!(is_published(&merged, &zone("a.net")));
        assert!(!is_published(&merged, &zone("b.net")));
        assert!(zone_statuses_equal(&merged[..1], &existing));
        assert!(!zone_statuses_equal(&merged, &existing));
    }
}
