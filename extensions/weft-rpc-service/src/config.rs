use std::time::Duration;
use weft::status::StatusCode;

/// Which load-balancing policy a channel's picker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LbPolicy {
    /// Always the first healthy endpoint.
    #[default]
    PickFirst,
    /// Rotate over healthy endpoints, one pick per call.
    RoundRobin,
}

/// Retry policy for a method group. Retries re-dispatch a call to another
/// endpoint; they are only attempted when the call's full request payload
/// is still buffered for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 2 disable
    /// retrying.
    pub max_attempts: u32,
    /// Status codes that may be retried; anything else is final.
    pub retryable_codes: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retryable_codes: vec![StatusCode::Unavailable],
        }
    }
}

/// Per-method-group settings, matched by path prefix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodConfig {
    /// Matches any method path starting with this prefix. An empty prefix
    /// matches everything.
    pub path_prefix: String,
    /// Deadline applied when the caller supplies none.
    pub default_timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
}

/// Policy data a channel consumes at construction time.
///
/// A `ServiceConfig` is read-only once applied: re-resolution may replace
/// it wholesale, but it is never mutated in place while calls are in
/// flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceConfig {
    pub lb_policy: LbPolicy,
    pub method_configs: Vec<MethodConfig>,
}

impl ServiceConfig {
    /// Returns the first method config whose prefix matches `path`.
    pub fn method_config(&self, path: &str) -> Option<&MethodConfig> {
        self.method_configs
            .iter()
            .find(|mc| path.starts_with(&mc.path_prefix))
    }

    pub fn default_timeout(&self, path: &str) -> Option<Duration> {
        self.method_config(path).and_then(|mc| mc.default_timeout)
    }

    pub fn retry_policy(&self, path: &str) -> Option<&RetryPolicy> {
        self.method_config(path).and_then(|mc| mc.retry.as_ref())
    }
}
