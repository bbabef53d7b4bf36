use std::time::Duration;
use weft::status::StatusCode;
use weft_rpc_service::{LbPolicy, MethodConfig, RetryPolicy, ServiceConfig};

fn config() -> ServiceConfig {
    ServiceConfig {
        lb_policy: LbPolicy::RoundRobin,
        method_configs: vec![
            MethodConfig {
                path_prefix: "/echo.Echo/".into(),
                default_timeout: Some(Duration::from_secs(5)),
                retry: Some(RetryPolicy {
                    max_attempts: 3,
                    retryable_codes: vec![StatusCode::Unavailable],
                }),
            },
            MethodConfig {
                path_prefix: String::new(),
                default_timeout: None,
                retry: None,
            },
        ],
    }
}

#[test]
fn first_matching_prefix_wins() {
    let config = config();

    let echo = config.method_config("/echo.Echo/Get").unwrap();
    assert_eq!(echo.default_timeout, Some(Duration::from_secs(5)));

    // The catch-all (empty prefix) matches everything else.
    let other = config.method_config("/other.Svc/Do").unwrap();
    assert_eq!(other.default_timeout, None);
}

#[test]
fn retry_policy_is_scoped_to_its_prefix() {
    let config = config();

    let retry = config.retry_policy("/echo.Echo/Get").unwrap();
    assert_eq!(retry.max_attempts, 3);
    assert!(retry.retryable_codes.contains(&StatusCode::Unavailable));

    assert!(config.retry_policy("/other.Svc/Do").is_none());
}

#[test]
fn default_timeout_lookup() {
    let config = config();
    assert_eq!(
        config.default_timeout("/echo.Echo/Expand"),
        Some(Duration::from_secs(5))
    );
    assert_eq!(config.default_timeout("/other.Svc/Do"), None);
}

#[test]
fn empty_config_matches_nothing() {
    let config = ServiceConfig::default();
    assert!(config.method_config("/any.Path/At").is_none());
    assert_eq!(config.lb_policy, LbPolicy::PickFirst);
}
