use podproxy::error::{ProxyError, Result};
use podproxy_common::ErrorKind;
use std::time::Duration;

#[test]
fn test_error_types() {
    let err = ProxyError::PodNotFound {
        name: "test-pod".to_string(),
        namespace: "default".to_string(),
    };

    assert!(err.to_string().contains("test-pod"));
    assert!(err.to_string().contains("default"));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_timeout_and_failure_are_distinct() {
    let timeout = ProxyError::Timeout {
        name: "w".to_string(),
        waited: Duration::from_secs(16),
    };
    let failed = ProxyError::PodFailed {
        name: "w".to_string(),
    };

    assert_eq!(timeout.kind(), ErrorKind::Timeout);
    assert_eq!(failed.kind(), ErrorKind::PodFailed);
    assert_ne!(timeout.kind(), failed.kind());
}

#[test]
fn test_result_alias() {
    fn parse() -> Result<u32> {
        Err(ProxyError::ConfigError("bad".to_string()))
    }
    assert!(parse().is_err());
}

#[test]
fn test_version_const() {
    assert!(!podproxy::VERSION.is_empty());
}
