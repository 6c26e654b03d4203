//! Proxy configuration
//!
//! Loaded once at startup from an optional YAML file. Every field has a
//! default, so an empty file (or no file) yields a working configuration.

use crate::lifecycle::RetryPolicy;
use crate::{ProxyError, Result};
use podproxy_common::{DEFAULT_MAX_FRAME_LENGTH, DEFAULT_PROXY_PORT};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Address the dispatcher binds
    pub listen: SocketAddr,
    /// Namespace every pod is created in
    pub namespace: String,
    pub max_frame_length: usize,
    pub pod: PodConfig,
    pub polling: PollingConfig,
}

/// Settings that shape every pod the builder produces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PodConfig {
    pub image: String,
    pub image_pull_policy: String,
    /// Interpreter that runs worker command lines
    pub runtime_entrypoint: String,
    /// Runtime installation prefix on the launching host. No rewrite when unset.
    pub host_runtime_prefix: Option<String>,
    /// Runtime installation prefix inside the image
    pub container_runtime_prefix: String,
    /// Host directory shared with every pod at the same path
    pub shared_mount_path: String,
    /// Host directory holding the container runtime's log files
    pub log_storage_root: String,
    /// Script the sidecar runs to forward main container output
    pub logger_script: String,
    pub run_as_user: i64,
    pub run_as_group: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollingConfig {
    /// How many times a pod that should exist is looked up again
    pub existence_retries: u32,
    pub existence_interval_ms: u64,
    pub readiness_interval_ms: u64,
    /// Total time spent waiting for a container id
    pub readiness_threshold_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PROXY_PORT),
            namespace: "default".to_string(),
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
            pod: PodConfig::default(),
            polling: PollingConfig::default(),
        }
    }
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            image: "ray_test:latest".to_string(),
            image_pull_policy: "Never".to_string(),
            runtime_entrypoint: "python".to_string(),
            host_runtime_prefix: None,
            container_runtime_prefix: "/usr/local/".to_string(),
            shared_mount_path: "/tmp/ray/".to_string(),
            log_storage_root: "/var/lib/docker/containers/".to_string(),
            logger_script: "/usr/local/lib/python3.8/site-packages/ray/_private/kube/kube_logger.py"
                .to_string(),
            run_as_user: 1000,
            run_as_group: 1000,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            existence_retries: 5,
            existence_interval_ms: 1_000,
            readiness_interval_ms: 2_000,
            readiness_threshold_ms: 15_000,
        }
    }
}

impl PollingConfig {
    /// Budget for looking up a pod that the caller says exists.
    pub fn existence_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.existence_interval_ms);
        RetryPolicy::new(interval, interval * self.existence_retries)
    }

    /// Budget for waiting on a pod's main container id.
    pub fn readiness_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.readiness_interval_ms),
            Duration::from_millis(self.readiness_threshold_ms),
        )
    }
}

impl ProxyConfig {
    /// Load from `path`, or use defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ProxyError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
                })?;
                Self::from_yaml(&raw)?
            }
            None => Self::default(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        // An empty document deserializes as null, which means "all defaults".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|e| ProxyError::ConfigError(format!("Invalid configuration: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(ProxyError::ConfigError("namespace must not be empty".into()));
        }
        if self.max_frame_length == 0 {
            return Err(ProxyError::ConfigError(
                "max_frame_length must be positive".into(),
            ));
        }
        if self.polling.existence_interval_ms == 0 || self.polling.readiness_interval_ms == 0 {
            return Err(ProxyError::ConfigError(
                "polling intervals must be positive".into(),
            ));
        }
        if let Some(host) = &self.pod.host_runtime_prefix {
            if host.trim_end_matches('/').is_empty() {
                return Err(ProxyError::ConfigError(
                    "host_runtime_prefix must not be the filesystem root".into(),
                ));
            }
        }
        Ok(())
    }
}
