//! Property-based tests for backoff and retry classification

use std::time::Duration;

use audiosep::{
    calculate_backoff, delay_for, executor::classify_response, header::HeaderMap, is_retryable,
    parse_retry_after, retry::MAX_BACKOFF, ApiError, RawResponse, StatusCode,
};
use proptest::prelude::*;

fn classify(status: u16) -> ApiError {
    classify_response(RawResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Vec::new(),
    })
    .unwrap_err()
}

#[test]
fn test_transient_statuses_are_retryable() {
    for status in [408, 429, 500, 502, 503, 504] {
        assert!(is_retryable(&classify(status)), "{status} should be retryable");
    }
}

#[test]
fn test_client_statuses_are_not_retryable() {
    for status in [400, 401, 403, 422] {
        assert!(!is_retryable(&classify(status)), "{status} should not be retryable");
    }
}

proptest! {
    #[test]
    fn prop_backoff_is_capped(attempt in any::<u32>(), base_ms in 0u64..10_000_000) {
        let delay = calculate_backoff(attempt, Duration::from_millis(base_ms));
        prop_assert!(delay <= MAX_BACKOFF);
    }

    #[test]
    fn prop_backoff_is_non_decreasing(attempt in 0u32..64, base_ms in 0u64..100_000) {
        let base = Duration::from_millis(base_ms);
        prop_assert!(calculate_backoff(attempt, base) <= calculate_backoff(attempt + 1, base));
    }

    #[test]
    fn prop_delay_without_hint_matches_backoff(attempt in 0u32..40, base_ms in 0u64..5_000) {
        let base = Duration::from_millis(base_ms);
        let err = classify(503);
        prop_assert_eq!(delay_for(attempt, base, &err), calculate_backoff(attempt, base));
    }

    #[test]
    fn prop_retry_after_seconds(secs in 0u64..1_000_000) {
        prop_assert_eq!(parse_retry_after(Some(&secs.to_string())), Duration::from_secs(secs));
    }

    #[test]
    fn prop_retry_after_never_panics(value in "\\PC{0,40}") {
        let _ = parse_retry_after(Some(&value));
    }

    #[test]
    fn prop_unlisted_server_errors_not_retried(status in 505u16..600) {
        prop_assert!(!is_retryable(&classify(status)));
    }
}
