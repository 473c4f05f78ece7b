// Retry policy
//
// Applied by the transport's dispatch loop to every request. A bare retry
// count is expanded by `RetryPolicy::from_count`, so the defaults it picks
// are visible here instead of inherited from an HTTP library.

use std::time::Duration;

use reqwest::{Method, StatusCode};

/// Upper bound on a single backoff sleep.
pub const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// Methods retried when a policy does not name its own set.
pub fn default_allowed_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::HEAD,
        Method::OPTIONS,
        Method::TRACE,
        Method::PUT,
        Method::DELETE,
    ]
}

/// When and how often a request is re-issued.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of retries (not counting the first attempt).
    pub total: u32,
    /// Exponential backoff base in seconds; `0.0` disables sleeping.
    pub backoff_factor: f64,
    /// Methods eligible for any retry.
    pub allowed_methods: Vec<Method>,
    /// Response statuses that trigger a retry.
    pub status_forcelist: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

impl RetryPolicy {
    /// Fail immediately on any error.
    pub fn none() -> Self {
        Self::from_count(0)
    }

    /// Canonical expansion of a bare retry count.
    ///
    /// Retries up to `count` times, only for GET, HEAD, OPTIONS, TRACE, PUT
    /// and DELETE, only on connection-level failures (no status codes), and
    /// without backoff.
    pub fn from_count(count: u32) -> Self {
        Self {
            total: count,
            backoff_factor: 0.0,
            allowed_methods: default_allowed_methods(),
            status_forcelist: Vec::new(),
        }
    }

    /// Alias of [`from_count`](Self::from_count), the starting point for a
    /// custom policy.
    pub fn new(total: u32) -> Self {
        Self::from_count(total)
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_allowed_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.allowed_methods = methods.into_iter().collect();
        self
    }

    pub fn with_status_forcelist(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.status_forcelist = statuses.into_iter().collect();
        self
    }

    pub fn is_method_allowed(&self, method: &Method) -> bool {
        self.allowed_methods.contains(method)
    }

    /// Whether a response with `status` should be retried after `retries`
    /// retries have already been spent.
    pub fn should_retry_status(&self, method: &Method, status: StatusCode, retries: u32) -> bool {
        retries < self.total
            && self.is_method_allowed(method)
            && self.status_forcelist.contains(&status.as_u16())
    }

    /// Whether a connection-level failure should be retried after `retries`
    /// retries have already been spent.
    pub fn should_retry_connection(&self, method: &Method, retries: u32) -> bool {
        retries < self.total && self.is_method_allowed(method)
    }

    /// Sleep before retry number `retry` (1-based): `factor × 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 || self.backoff_factor <= 0.0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let secs = self.backoff_factor * 2.0_f64.powi(exponent);
        if secs.is_finite() && secs < BACKOFF_MAX.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            BACKOFF_MAX
        }
    }
}

/// Retry configuration as supplied by a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrySpec {
    /// Bare retry count, expanded by [`RetryPolicy::from_count`].
    Count(u32),
    /// Fully specified policy, used verbatim.
    Policy(RetryPolicy),
}

impl Default for RetrySpec {
    fn default() -> Self {
        Self::Count(0)
    }
}

impl RetrySpec {
    pub fn into_policy(self) -> RetryPolicy {
        match self {
            Self::Count(count) => RetryPolicy::from_count(count),
            Self::Policy(policy) => policy,
        }
    }
}

impl From<u32> for RetrySpec {
    fn from(value: u32) -> Self {
        Self::Count(value)
    }
}

impl From<RetryPolicy> for RetrySpec {
    fn from(value: RetryPolicy) -> Self {
        Self::Policy(value)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn count_expands_to_idempotent_policy() {
        let policy = RetrySpec::from(3).into_policy();
        assert_eq!(policy.total, 3);
        assert!(policy.status_forcelist.is_empty());
        assert!(policy.backoff_factor.abs() < f64::EPSILON);

        for method in [
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::TRACE,
            Method::PUT,
            Method::DELETE,
        ] {
            assert!(policy.is_method_allowed(&method), "{method} should be retried");
        }
        assert!(!policy.is_method_allowed(&Method::POST));
        assert!(!policy.is_method_allowed(&Method::PATCH));
    }

    #[test]
    fn count_policy_retries_get_connections_but_not_post() {
        let policy = RetryPolicy::from_count(3);
        assert!(policy.should_retry_connection(&Method::GET, 0));
        assert!(policy.should_retry_connection(&Method::GET, 2));
        assert!(!policy.should_retry_connection(&Method::GET, 3));
        assert!(!policy.should_retry_connection(&Method::POST, 0));
    }

    #[test]
    fn count_policy_never_retries_status() {
        let policy = RetryPolicy::from_count(3);
        for status in [500, 502, 503, 504] {
            let status = StatusCode::from_u16(status).unwrap();
            assert!(!policy.should_retry_status(&Method::GET, status, 0));
        }
    }

    #[test]
    fn no_policy_means_no_retries() {
        let policy = RetrySpec::default().into_policy();
        assert_eq!(policy, RetryPolicy::none());
        assert!(!policy.should_retry_connection(&Method::GET, 0));
    }

    #[test]
    fn custom_policy_used_verbatim() {
        let policy = RetryPolicy::new(5)
            .with_backoff_factor(0.5)
            .with_allowed_methods([Method::POST])
            .with_status_forcelist([500, 502, 503, 504]);
        let spec = RetrySpec::from(policy.clone());
        assert_eq!(spec.into_policy(), policy);

        assert!(policy.should_retry_status(&Method::POST, StatusCode::SERVICE_UNAVAILABLE, 4));
        assert!(!policy.should_retry_status(&Method::POST, StatusCode::SERVICE_UNAVAILABLE, 5));
        assert!(!policy.should_retry_status(&Method::GET, StatusCode::SERVICE_UNAVAILABLE, 0));
        assert!(!policy.should_retry_status(&Method::POST, StatusCode::NOT_FOUND, 0));
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::new(10).with_backoff_factor(1.0);
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(16));
        assert_eq!(policy.backoff(9), BACKOFF_MAX);

        let half = RetryPolicy::new(3).with_backoff_factor(0.5);
        assert_eq!(half.backoff(2), Duration::from_secs(1));

        assert_eq!(RetryPolicy::from_count(3).backoff(2), Duration::ZERO);
    }
}
