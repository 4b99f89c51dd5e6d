//! Error classification shared across the workspace.
//!
//! Components define their own error enums; implementing
//! [`ErrorClassification`] lets the job orchestrator decide uniformly
//! whether a failure is worth retrying and how long to wait.

use std::time::Duration;

/// Broad category of a failure, independent of where it occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Temporary condition (network blip, pool timeout); retry may succeed
    Transient,
    /// Will fail the same way on retry (bad data, missing symbol)
    Permanent,
    /// Misconfiguration; operator action required
    Configuration,
    /// Rate limit or quota hit; retry after backing off
    ResourceExhausted,
    /// Bug or invariant violation inside this system
    Internal,
}

/// Classification hook for error types.
pub trait ErrorClassification {
    /// Category of this error.
    fn category(&self) -> ErrorCategory;

    /// Suggested delay before retrying, if retrying makes sense.
    fn suggested_retry_delay(&self) -> Option<Duration> {
        None
    }

    /// Whether a bounded retry is worthwhile.
    fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transient | ErrorCategory::ResourceExhausted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky;

    impl ErrorClassification for Flaky {
        fn category(&self) -> ErrorCategory {
            ErrorCategory::Transient
        }
    }

    struct Broken;

    impl ErrorClassification for Broken {
        fn category(&self) -> ErrorCategory {
            ErrorCategory::Permanent
        }
    }

    #[test]
    fn test_retryable_categories() {
        assert!(Flaky.is_retryable());
        assert!(!Broken.is_retryable());
        assert_eq!(Flaky.suggested_retry_delay(), None);
    }
}
