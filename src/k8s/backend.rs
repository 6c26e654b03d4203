use crate::pod::PodSpec;
use crate::k8s::types::PodStatus;
use crate::Result;
use async_trait::async_trait;

/// The orchestration verbs the proxy relies on.
///
/// Implementations hold no per-pod state of their own; the backend is the
/// source of truth and every call may run concurrently with any other.
/// Absent pods are reported as [`crate::ProxyError::PodNotFound`], name
/// conflicts on create as [`crate::ProxyError::AlreadyExists`].
#[async_trait]
pub trait PodBackend: Send + Sync {
    async fn create_pod(&self, spec: &PodSpec) -> Result<()>;

    async fn read_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus>;

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodStatus>>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()>;
}
