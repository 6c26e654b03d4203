use crate::config::PollingConfig;
use crate::k8s::{PodBackend, PodPhase, PodStatus};
use crate::lifecycle::poll::{poll_until, Attempt, PollOutcome, RetryPolicy};
use crate::metrics::ProxyMetrics;
use crate::pod::{main_container_name, PodSpecBuilder};
use crate::{ProxyError, Result};
use podproxy_common::LaunchRequest;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runtime id of a container as reported by the backend, e.g. `docker://3f2a...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteAllSummary {
    pub listed: usize,
    pub deleted: usize,
    pub not_found: usize,
    pub failed: usize,
}

impl std::fmt::Display for DeleteAllSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "deleted {} of {} pods ({} already gone, {} failed)",
            self.deleted, self.listed, self.not_found, self.failed
        )
    }
}

/// Creates, deletes and inspects pods in one namespace.
///
/// Shared by every connection handler. It holds configuration and the
/// backend handle only, so concurrent calls never contend on proxy state.
pub struct PodManager {
    backend: Arc<dyn PodBackend>,
    builder: PodSpecBuilder,
    existence: RetryPolicy,
    readiness: RetryPolicy,
    metrics: ProxyMetrics,
}

impl PodManager {
    pub fn new(
        backend: Arc<dyn PodBackend>,
        builder: PodSpecBuilder,
        polling: &PollingConfig,
        metrics: ProxyMetrics,
    ) -> Self {
        Self {
            backend,
            builder,
            existence: polling.existence_policy(),
            readiness: polling.readiness_policy(),
            metrics,
        }
    }

    pub fn namespace(&self) -> &str {
        self.builder.namespace()
    }

    /// The budget used for container id lookups coming from callers.
    pub fn readiness_policy(&self) -> RetryPolicy {
        self.readiness
    }

    /// Create the pod unless one with the same name already exists.
    ///
    /// Creation failures are returned, not retried.
    pub async fn create_if_absent(&self, request: &LaunchRequest) -> Result<CreateOutcome> {
        let name = request.name();

        if self.get_pod_by_name(name, false).await?.is_some() {
            debug!(pod = name, "Pod already exists, skipping create");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let spec = self.builder.build(request);
        info!(
            pod = name,
            namespace = self.namespace(),
            pod_type = %request.pod_type(),
            containers = spec.containers().count(),
            "Creating pod"
        );

        match self.backend.create_pod(&spec).await {
            Ok(()) => {
                self.metrics.pods_created.inc();
                Ok(CreateOutcome::Created)
            }
            // Lost a race with a concurrent create for the same name.
            Err(ProxyError::AlreadyExists { .. }) => {
                debug!(pod = name, "Pod created concurrently by another request");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => {
                warn!(pod = name, error = %e, "Failed to create pod");
                Err(e)
            }
        }
    }

    /// Delete a pod by name. Never fails; the outcome is only reported.
    pub async fn delete(&self, name: &str) -> DeleteOutcome {
        match self.backend.delete_pod(self.namespace(), name).await {
            Ok(()) => {
                info!(pod = name, namespace = self.namespace(), "Deleted pod");
                self.metrics.pods_deleted.inc();
                DeleteOutcome::Deleted
            }
            Err(ProxyError::PodNotFound { .. }) => {
                info!(pod = name, "Pod to delete does not exist");
                DeleteOutcome::NotFound
            }
            Err(e) => {
                warn!(pod = name, error = %e, "Failed to delete pod");
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }

    /// Delete every pod in the namespace, continuing past individual failures.
    pub async fn delete_all(&self) -> Result<DeleteAllSummary> {
        let pods = self.backend.list_pods(self.namespace()).await?;
        let mut summary = DeleteAllSummary {
            listed: pods.len(),
            ..Default::default()
        };

        for pod in &pods {
            match self.delete(&pod.name).await {
                DeleteOutcome::Deleted => summary.deleted += 1,
                DeleteOutcome::NotFound => summary.not_found += 1,
                DeleteOutcome::Failed(_) => summary.failed += 1,
            }
        }

        info!(namespace = self.namespace(), %summary, "Deleted all pods");
        Ok(summary)
    }

    /// Look a pod up by name.
    ///
    /// With `assume_exists` the pod is expected to show up shortly, so absence
    /// is retried under the existence budget before giving up with `None`.
    /// Without it, absence is an immediate `None`.
    pub async fn get_pod_by_name(
        &self,
        name: &str,
        assume_exists: bool,
    ) -> Result<Option<PodStatus>> {
        let policy = if assume_exists {
            self.existence
        } else {
            RetryPolicy::once()
        };
        let namespace = self.namespace();

        let outcome = poll_until(policy, || async move {
            match self.backend.read_pod_status(namespace, name).await {
                Ok(status) => Ok(Attempt::Ready(status)),
                Err(ProxyError::PodNotFound { .. }) => Ok(Attempt::Pending),
                Err(e) => Err(e),
            }
        })
        .await?;

        if let PollOutcome::Exhausted { attempts, .. } = &outcome {
            if assume_exists {
                debug!(pod = name, attempts, "Pod never appeared");
            }
        }

        Ok(outcome.ready())
    }

    /// Wait for the pod's main container to report a runtime id.
    ///
    /// A Failed pod ends the wait at once with [`ProxyError::PodFailed`];
    /// running out of `budget` yields [`ProxyError::Timeout`].
    pub async fn resolve_main_container_id(
        &self,
        name: &str,
        budget: RetryPolicy,
    ) -> Result<ContainerId> {
        let namespace = self.namespace();

        let first = self
            .get_pod_by_name(name, true)
            .await?
            .ok_or_else(|| ProxyError::PodNotFound {
                name: name.to_string(),
                namespace: namespace.to_string(),
            })?;

        let container = main_container_name(name);
        let container = container.as_str();
        let mut cached = Some(first);

        let outcome = poll_until(budget, || {
            let cached = cached.take();
            async move {
                let status = match cached {
                    Some(status) => status,
                    None => self.backend.read_pod_status(namespace, name).await?,
                };

                if status.phase == PodPhase::Failed {
                    return Err(ProxyError::PodFailed {
                        name: name.to_string(),
                    });
                }

                match status.container_id(container) {
                    Some(id) => Ok(Attempt::Ready(ContainerId(id.to_string()))),
                    None => {
                        debug!(pod = name, phase = %status.phase, "Main container not started yet");
                        Ok(Attempt::Pending)
                    }
                }
            }
        })
        .await?;

        match outcome {
            PollOutcome::Ready(id) => {
                debug!(pod = name, container_id = %id, "Resolved main container");
                Ok(id)
            }
            PollOutcome::Exhausted { waited, .. } => {
                warn!(pod = name, ?waited, "Timed out waiting for main container");
                Err(ProxyError::Timeout {
                    name: name.to_string(),
                    waited,
                })
            }
        }
    }
}
