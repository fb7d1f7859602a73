// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn test_parse_address_list() {
        let parsed = parse_address_list(
            "lb.example.com",
            r#"[{"ip": "192.0.2.1", "ttl": 60}, {"ip": "192.0.2.2", "ttl": 30}]"#,
        )
        .unwrap();

        assert_eq!(
            parsed,
            vec![
                HostAddress::new("lb.example.com", v4(192, 0, 2, 1), Duration::from_secs(60)),
                HostAddress::new("lb.example.com", v4(192, 0, 2, 2), Duration::from_secs(30)),
            ]
        );
    }

    #[test]
    fn test_parse_address_list_accepts_uppercase_fields() {
        let parsed = parse_address_list("h", r#"[{"IP": "2001:db8::1", "TTL": 5}]"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].ip, "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_parse_address_list_rejects_garbage() {
        let err = parse_address_list("h", "not json").unwrap_err();
        assert!(matches!(err, ResolveError::InvalidEntry { ref host, .. } if host == "h"));

        let err = parse_address_list("h", r#"[{"ip": "999.0.0.1", "ttl": 5}]"#).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidEntry { .. }));
    }

    #[test]
    fn test_parse_empty_list() {
        assert!(parse_address_list("h", "[]").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_static_resolver() {
        let resolver = StaticHostResolver::new();
        let addr = HostAddress::new("a.example.com", v4(10, 0, 0, 1), Duration::from_secs(60));
        resolver.set("a.example.com", vec![addr.clone()]);

        assert_eq!(
            resolver.lookup_ip_address("a.example.com").await.unwrap(),
            vec![addr]
        );

        resolver.remove("a.example.com");
        let err = resolver.lookup_ip_address("a.example.com").await.unwrap_err();
        assert!(matches!(err, ResolveError::UnknownHost { .. }));
    }

    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HostResolver for ConcurrencyProbe {
        async fn lookup_ip_address(&self, _host: &str) -> Result<Vec<HostAddress>, ResolveError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_safe_resolver_serializes_lookups() {
        let probe = ConcurrencyProbe {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        };
        let safe = Arc::new(SafeHostResolver::new(probe));

        let mut handles = Vec::new();
        for i in 0..4 {
            let safe = Arc::clone(&safe);
            handles.push(tokio::spawn(async move {
                safe.lookup_ip_address(&format!("h{i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(safe.inner.max_in_flight.load(Ordering::SeqCst), 1);
    }
}
