// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::errors::ResolveError;
    use std::collections::VecDeque;
    use std::net::{IpAddr, Ipv4Addr};
    use tokio::time::Instant;

    const HOST: &str = "lb.example.com";

    fn addr(last: u8, ttl: u64) -> HostAddress {
        HostAddress::new(
            HOST,
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, last)),
            Duration::from_secs(ttl),
        )
    }

    /// Replays scripted answers, repeating the last one, and records when it was called.
    struct ScriptedResolver {
        script: Mutex<VecDeque<Result<Vec<HostAddress>, ResolveError>>>,
        last: Mutex<Option<Result<Vec<HostAddress>, ResolveError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedResolver {
        fn new(script: Vec<Result<Vec<HostAddress>, ResolveError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn call_offsets(&self, start: Instant) -> Vec<Duration> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|t| t.duration_since(start))
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl HostResolver for ScriptedResolver {
        async fn lookup_ip_address(&self, _host: &str) -> Result<Vec<HostAddress>, ResolveError> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(next) = next {
                *last = Some(next);
            }
            last.clone().unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    struct Harness {
        watcher: HostsWatcher,
        rx: mpsc::UnboundedReceiver<ObjectKey>,
        shutdown: watch::Sender<bool>,
    }

    fn harness(resolver: Arc<ScriptedResolver>) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        Harness {
            watcher: HostsWatcher::new(resolver, tx, shutdown_rx),
            rx,
            shutdown,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ObjectKey>) -> Vec<ObjectKey> {
        let mut keys = Vec::new();
        while let Ok(key) = rx.try_recv() {
            keys.push(key);
        }
        keys
    }

    fn root_key() -> ObjectKey {
        ObjectKey::new("", "default", "web")
    }

    #[test]
    fn test_compare_records() {
        let base = vec![addr(1, 60), addr(2, 60)];

        assert_eq!(
            compare_records(&base, &[addr(1, 30), addr(2, 10)]),
            RecordsChange::Unchanged
        );
        assert_eq!(
            compare_records(&base, &[addr(1, 60)]),
            RecordsChange::AddressesChanged
        );
        assert_eq!(
            compare_records(&base, &[addr(1, 60), addr(3, 60)]),
            RecordsChange::AddressesChanged
        );
        assert_eq!(
            compare_records(&base, &[addr(1, 60), addr(2, 61)]),
            RecordsChange::TtlIncreased
        );
    }

    #[test]
    fn test_next_interval() {
        assert_eq!(
            next_interval(&[addr(1, 60), addr(2, 20)], half_ttl),
            Duration::from_secs(10)
        );
        assert_eq!(
            next_interval(&[addr(1, 1)], half_ttl),
            Duration::from_secs(WATCH_MIN_INTERVAL_SECS)
        );
        assert_eq!(
            next_interval(&[], half_ttl),
            Duration::from_secs(WATCH_EMPTY_INTERVAL_SECS)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_decrease_reschedules_without_notifying() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 60)]), Ok(vec![addr(1, 30)])]);
        let mut h = harness(Arc::clone(&resolver));
        let start = Instant::now();

        assert!(h.watcher.start_watching(&root_key(), HOST));
        tokio::time::sleep(Duration::from_secs(50)).await;

        // Baseline at 0s (TTL 60 => 30s), then TTL 30 => 15s.
        assert_eq!(
            resolver.call_offsets(start),
            vec![Duration::ZERO, Duration::from_secs(30), Duration::from_secs(45)]
        );
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_change_notifies_once() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 60)]), Ok(vec![addr(2, 60)])]);
        let mut h = harness(Arc::clone(&resolver));

        h.watcher.start_watching(&root_key(), HOST);
        tokio::time::sleep(Duration::from_secs(200)).await;

        assert!(resolver.call_count() > 2);
        assert_eq!(drain(&mut h.rx), vec![root_key()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_increase_notifies() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 30)]), Ok(vec![addr(1, 60)])]);
        let mut h = harness(Arc::clone(&resolver));

        h.watcher.start_watching(&root_key(), HOST);
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(drain(&mut h.rx), vec![root_key()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_record_order_is_not_a_change() {
        let resolver = ScriptedResolver::new(vec![
            Ok(vec![addr(1, 60), addr(2, 60)]),
            Ok(vec![addr(2, 60), addr(1, 60)]),
        ]);
        let mut h = harness(Arc::clone(&resolver));

        h.watcher.start_watching(&root_key(), HOST);
        tokio::time::sleep(Duration::from_secs(100)).await;

        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_error_retries_and_keeps_baseline() {
        let resolver = ScriptedResolver::new(vec![
            Err(ResolveError::UnknownHost { host: HOST.into() }),
            Ok(vec![addr(1, 60)]),
        ]);
        let mut h = harness(Arc::clone(&resolver));
        let start = Instant::now();

        h.watcher.start_watching(&root_key(), HOST);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(
            resolver.call_offsets(start),
            vec![Duration::ZERO, Duration::from_secs(WATCH_RETRY_DELAY_SECS)]
        );
        // The first success is the baseline.
        assert!(drain(&mut h.rx).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_watching_is_idempotent() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 60)])]);
        let h = harness(Arc::clone(&resolver));

        assert!(h.watcher.start_watching(&root_key(), HOST));
        assert!(!h.watcher.start_watching(&root_key(), HOST));
        assert!(h.watcher.start_watching(&root_key(), "other.example.com"));
        assert_eq!(
            h.watcher.watched_hosts(&root_key()),
            vec![HOST.to_string(), "other.example.com".to_string()]
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(resolver.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_watching_ends_polling() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 10)])]);
        let h = harness(Arc::clone(&resolver));
        let key = root_key();

        h.watcher.start_watching(&key, HOST);
        tokio::time::sleep(Duration::from_secs(12)).await;
        let polls = resolver.call_count();
        assert!(polls >= 2);

        h.watcher.stop_watching(&key);
        assert!(!h.watcher.is_watching(&key, HOST));
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(resolver.call_count(), polls);

        // Unknown keys are ignored.
        h.watcher.stop_watching(&key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_polling() {
        let resolver = ScriptedResolver::new(vec![Ok(vec![addr(1, 10)])]);
        let h = harness(Arc::clone(&resolver));

        h.watcher.start_watching(&root_key(), HOST);
        tokio::time::sleep(Duration::from_secs(1)).await;
        h.shutdown.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        let polls = resolver.call_count();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(resolver.call_count(), polls);
    }
}
