//! Hop-count recursion guard.
//!
//! Proxy loops (a rewrite that proxies back to itself, two apps proxying to
//! each other) would otherwise run until the platform kills the invocation.
//! Every outbound hop increments a counter header; once the inbound count
//! exceeds the configured limit, the guard fails fast before any network
//! call is attempted.

use edgestack_model::{EdgeError, EdgeResult};

/// Default maximum inbound hop count.
pub const DEFAULT_RECURSION_LIMIT: u32 = 5;

/// Hop-count based loop breaker for outbound calls.
#[derive(Debug, Clone, Copy)]
pub struct RecursionGuard {
    limit: u32,
}

impl Default for RecursionGuard {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

impl RecursionGuard {
    /// Create a guard with an explicit limit.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self { limit }
    }

    /// The configured limit.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Check an inbound hop count. A count of exactly `limit` is still
    /// allowed; only counts beyond it are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`EdgeError::RecursionLimitExceeded`] when `count > limit`.
    pub fn check(&self, count: u32) -> EdgeResult<()> {
        if count > self.limit {
            Err(EdgeError::RecursionLimitExceeded {
                count,
                limit: self.limit,
            })
        } else {
            Ok(())
        }
    }

    /// The hop count to stamp on outbound calls for a request that arrived
    /// with `inbound_count`.
    #[must_use]
    pub fn next_count(&self, inbound_count: u32) -> u32 {
        inbound_count.saturating_add(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_allow_counts_up_to_the_limit() {
        let guard = RecursionGuard::default();
        for count in 0..=5 {
            guard.check(count).expect("count within limit");
        }
    }

    #[test]
    fn test_should_reject_count_beyond_limit() {
        let guard = RecursionGuard::default();
        let err = guard.check(6).unwrap_err();
        assert!(matches!(
            err,
            EdgeError::RecursionLimitExceeded { count: 6, limit: 5 }
        ));
    }

    #[test]
    fn test_should_increment_outbound_count() {
        let guard = RecursionGuard::new(3);
        assert_eq!(guard.next_count(0), 1);
        assert_eq!(guard.next_count(3), 4);
    }
}
