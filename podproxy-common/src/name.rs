//! Pod name validation
//!
//! Pod names become part of container names (`container-<name>`), and
//! container names must be RFC 1123 labels of at most 63 characters, so the
//! pod name itself is held to the same alphabet with room for the prefix.

use crate::wire::DecodeError;

/// Longest pod name that still yields valid container names.
pub const MAX_NAME_LEN: usize = 53;

/// Check that `name` is usable as a pod name.
pub fn validate_name(name: &str) -> Result<(), DecodeError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.len() > MAX_NAME_LEN {
        Some("name is too long")
    } else if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        Some("only lowercase alphanumerics and '-' are allowed")
    } else if name.starts_with('-') || name.ends_with('-') {
        Some("name must start and end with an alphanumeric character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DecodeError::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Callers derive pod names from process identifiers that use underscores.
pub fn normalize_name(raw: &str) -> String {
    raw.replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_worker_names() {
        assert!(validate_name("worker-004213").is_ok());
        assert!(validate_name("a").is_ok());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_rejects_bad_names() {
        for bad in ["", "-worker", "worker-", "Worker", "worker_1", "10.0.0.1-worker"] {
            assert!(validate_name(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("worker_01_ab"), "worker-01-ab");
        assert_eq!(normalize_name("worker-1"), "worker-1");
    }
}
