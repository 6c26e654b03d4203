use podproxy_common::{DecodeError, ErrorKind};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Kubernetes error: {0}")]
    Backend(String),

    #[error("Pod not found: {name} in namespace {namespace}")]
    PodNotFound { name: String, namespace: String },

    #[error("Pod already exists: {name} in namespace {namespace}")]
    AlreadyExists { name: String, namespace: String },

    #[error("Timed out after {waited:?} waiting for pod {name}")]
    Timeout { name: String, waited: Duration },

    #[error("Pod {name} entered the Failed phase")]
    PodFailed { name: String },

    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    #[error("Metrics error: {0}")]
    MetricsError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProxyError {
    /// The class reported to callers over the wire.
    ///
    /// `AlreadyExists` never reaches a caller through create, but a backend
    /// conflict on any other verb is still a backend failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProxyError::PodNotFound { .. } => ErrorKind::NotFound,
            ProxyError::Timeout { .. } => ErrorKind::Timeout,
            ProxyError::PodFailed { .. } => ErrorKind::PodFailed,
            ProxyError::Protocol(_) => ErrorKind::Protocol,
            ProxyError::Backend(_)
            | ProxyError::AlreadyExists { .. }
            | ProxyError::MetricsError(_)
            | ProxyError::ConfigError(_)
            | ProxyError::IoError(_) => ErrorKind::Backend,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
