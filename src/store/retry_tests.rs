// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(Box::new(kube::core::Status {
            status: Some(kube::core::response::StatusSummary::Failure),
            message: format!("{reason} happened"),
            reason: reason.to_string(),
            code,
            ..Default::default()
        }))
    }

    #[test]
    fn test_base_delay_doubles_then_caps() {
        assert_eq!(ApiBackoff::base_delay(0), Duration::from_millis(100));
        assert_eq!(ApiBackoff::base_delay(1), Duration::from_millis(200));
        assert_eq!(ApiBackoff::base_delay(3), Duration::from_millis(800));
        assert_eq!(ApiBackoff::base_delay(7), Duration::from_secs(10));
        assert_eq!(ApiBackoff::base_delay(40), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_delay_stays_within_jitter() {
        let mut backoff = ApiBackoff::new();
        for attempt in 0..10 {
            let base = ApiBackoff::base_delay(attempt);
            let delay = backoff.next_delay().unwrap();
            assert!(delay >= base.mul_f64(0.9) && delay <= base.mul_f64(1.1));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_delay_stops_after_budget() {
        let mut backoff = ApiBackoff::new();
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(backoff.next_delay().is_none());
    }

    #[test]
    fn test_transient_errors() {
        assert!(is_transient(&api_error(429, "TooManyRequests")));
        assert!(is_transient(&api_error(500, "InternalError")));
        assert!(is_transient(&api_error(503, "ServiceUnavailable")));
        assert!(!is_transient(&api_error(404, "NotFound")));
        assert!(!is_transient(&api_error(409, "Conflict")));
        assert!(!is_transient(&api_error(403, "Forbidden")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_from_transient_errors() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result = retry_api_call(
            move || async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(api_error(503, "ServiceUnavailable"))
                } else {
                    Ok("done")
                }
            },
            "get ingress",
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_returned_at_once() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<(), kube::Error> = retry_api_call(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(api_error(409, "Conflict"))
            },
            "update ingress",
        )
        .await;

        assert!(matches!(result, Err(kube::Error::Api(ref e)) if e.code == 409));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_when_budget_is_spent() {
        let attempts = AtomicUsize::new(0);
        let counter = &attempts;
        let result: Result<(), kube::Error> = retry_api_call(
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(api_error(500, "InternalError"))
            },
            "list ingresses",
        )
        .await;

        assert!(result.is_err());
        assert!(attempts.load(Ordering::SeqCst) > 5);
    }
}
