use crate::name::validate_name;
use crate::wire::DecodeError;
use crate::ENV_PREFIX;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of process the pod runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodType {
    /// A worker process started through the runtime entrypoint
    Worker,
    /// Anything else; the command line is executed as given
    Other,
}

impl PodType {
    /// Any type string other than `worker` selects [`PodType::Other`].
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("worker") => PodType::Worker,
            _ => PodType::Other,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PodType::Worker => "worker",
            PodType::Other => "other",
        }
    }
}

impl std::fmt::Display for PodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Files on the shared volume that receive the main container's output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRedirect {
    pub stdout: String,
    pub stderr: String,
}

/// A validated request to launch one pod.
///
/// Construction checks the pod name and the environment prefix; after that
/// the request is read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    name: String,
    command: Vec<String>,
    environment: BTreeMap<String, String>,
    pod_type: PodType,
    log_redirect: Option<LogRedirect>,
}

impl LaunchRequest {
    pub fn new(
        name: impl Into<String>,
        command: Vec<String>,
        environment: BTreeMap<String, String>,
        pod_type: PodType,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        validate_name(&name)?;

        if let Some(key) = environment.keys().find(|k| !k.starts_with(ENV_PREFIX)) {
            return Err(DecodeError::ForeignEnv(key.clone()));
        }

        Ok(Self {
            name,
            command,
            environment,
            pod_type,
            log_redirect: None,
        })
    }

    pub fn with_log_redirect(mut self, redirect: LogRedirect) -> Self {
        self.log_redirect = Some(redirect);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    pub fn pod_type(&self) -> PodType {
        self.pod_type
    }

    pub fn log_redirect(&self) -> Option<&LogRedirect> {
        self.log_redirect.as_ref()
    }
}
