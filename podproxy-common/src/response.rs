use serde::{Deserialize, Serialize};

/// Failure classes a caller can tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The orchestration backend refused or could not be reached
    Backend,
    NotFound,
    /// Waited the full budget without the pod becoming ready
    Timeout,
    /// The pod reached the failed phase
    PodFailed,
    /// The request could not be decoded; the connection is closed after this
    Protocol,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Backend => "backend",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Timeout => "timeout",
            ErrorKind::PodFailed => "pod_failed",
            ErrorKind::Protocol => "protocol",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reply to exactly one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProxyResponse {
    Success {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    Value {
        value: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ProxyResponse {
    pub fn success() -> Self {
        ProxyResponse::Success { detail: None }
    }

    pub fn success_with(detail: impl Into<String>) -> Self {
        ProxyResponse::Success {
            detail: Some(detail.into()),
        }
    }

    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ProxyResponse::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProxyResponse::Error { .. })
    }

    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            ProxyResponse::Success { .. } => "success",
            ProxyResponse::Value { .. } => "value",
            ProxyResponse::Error { kind, .. } => kind.as_str(),
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
