//! Property-based tests for the retry policy

use fieldsync::offline::{Disposition, RetryPolicy};
use fieldsync::remote::RemoteError;
use proptest::prelude::*;

proptest! {
    #[test]
    fn test_server_errors_are_retried(status in 500u16..600) {
        let policy = RetryPolicy::default();
        prop_assert_eq!(policy.classify(&RemoteError::http(status, "")), Disposition::Retry);
    }

    #[test]
    fn test_client_errors_are_terminal(status in 400u16..500) {
        prop_assume!(status != 408 && status != 429);
        let policy = RetryPolicy::default();
        prop_assert_eq!(policy.classify(&RemoteError::http(status, "")), Disposition::Terminal);
    }

    #[test]
    fn test_network_errors_are_retried(message in ".*") {
        let policy = RetryPolicy::default();
        prop_assert_eq!(policy.classify(&RemoteError::Network(message)), Disposition::Retry);
    }

    #[test]
    fn test_exhaustion_matches_cap(max in 1u32..20, attempts in 0u32..40) {
        let policy = RetryPolicy::new(max);
        prop_assert_eq!(policy.is_exhausted(attempts), attempts >= max);
    }
}
