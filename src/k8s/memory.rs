//! In-memory [`PodBackend`]
//!
//! Stands in for a cluster when running `serve --dry-run` and in tests. Pods
//! move from Pending to Running (or Failed) according to a [`Startup`]
//! script, counted in status reads.

use crate::k8s::backend::PodBackend;
use crate::k8s::types::{PodPhase, PodStatus};
use crate::pod::PodSpec;
use crate::{ProxyError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// How a freshly created pod progresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Startup {
    /// Running with container ids as soon as it is created
    Immediate,
    /// Pending for this many status reads, then Running
    AfterReads(u32),
    /// Stays Pending forever
    Never,
    /// Pending for this many status reads, then Failed
    FailAfterReads(u32),
}

struct MemoryPod {
    spec: PodSpec,
    status: PodStatus,
    startup: Startup,
    reads: u32,
}

#[derive(Default)]
struct MemoryState {
    pods: BTreeMap<(String, String), MemoryPod>,
    next_container: u64,
    create_calls: usize,
    fail_creates: Option<String>,
    fail_deletes: Vec<String>,
}

#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    startup: Startup,
    latency: Option<Duration>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(Startup::Immediate)
    }
}

impl MemoryBackend {
    pub fn new(startup: Startup) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            startup,
            latency: None,
        }
    }

    /// Delay every call, like a slow API server.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every later create fail with a backend error.
    pub fn fail_creates(&self, message: impl Into<String>) {
        self.lock().fail_creates = Some(message.into());
    }

    /// Make deleting `name` fail with a backend error.
    pub fn fail_delete_of(&self, name: impl Into<String>) {
        self.lock().fail_deletes.push(name.into());
    }

    /// Override the startup script of an existing pod.
    pub fn set_startup(&self, namespace: &str, name: &str, startup: Startup) {
        let mut state = self.lock();
        if let Some(pod) = state.pods.get_mut(&key(namespace, name)) {
            pod.startup = startup;
            pod.reads = 0;
        }
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.lock().pods.contains_key(&key(namespace, name))
    }

    pub fn pod_names(&self, namespace: &str) -> Vec<String> {
        self.lock()
            .pods
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn spec(&self, namespace: &str, name: &str) -> Option<PodSpec> {
        self.lock()
            .pods
            .get(&key(namespace, name))
            .map(|pod| pod.spec.clone())
    }

    /// Number of create calls that reached the backend, successful or not.
    pub fn create_calls(&self) -> usize {
        self.lock().create_calls
    }

    // Never held across an await point.
    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn key(namespace: &str, name: &str) -> (String, String) {
    (namespace.to_string(), name.to_string())
}

fn not_found(namespace: &str, name: &str) -> ProxyError {
    ProxyError::PodNotFound {
        name: name.to_string(),
        namespace: namespace.to_string(),
    }
}

fn start(pod: &mut MemoryPod, next_container: &mut u64) {
    pod.status.phase = PodPhase::Running;
    pod.status.pod_ip = Some("127.0.0.1".to_string());
    for container in pod.spec.containers() {
        *next_container += 1;
        pod.status.container_statuses.insert(
            container.name.clone(),
            format!("memory://{:012x}", next_container),
        );
    }
}

#[async_trait]
impl PodBackend for MemoryBackend {
    async fn create_pod(&self, spec: &PodSpec) -> Result<()> {
        self.simulate_latency().await;

        let mut state = self.lock();
        state.create_calls += 1;

        if let Some(message) = &state.fail_creates {
            return Err(ProxyError::Backend(message.clone()));
        }

        let pod_key = key(spec.namespace(), spec.name());
        if state.pods.contains_key(&pod_key) {
            return Err(ProxyError::AlreadyExists {
                name: spec.name().to_string(),
                namespace: spec.namespace().to_string(),
            });
        }

        let mut pod = MemoryPod {
            spec: spec.clone(),
            status: PodStatus {
                name: spec.name().to_string(),
                phase: PodPhase::Pending,
                pod_ip: None,
                container_statuses: BTreeMap::new(),
            },
            startup: self.startup,
            reads: 0,
        };

        if self.startup == Startup::Immediate {
            let mut next = state.next_container;
            start(&mut pod, &mut next);
            state.next_container = next;
        }

        state.pods.insert(pod_key, pod);
        Ok(())
    }

    async fn read_pod_status(&self, namespace: &str, name: &str) -> Result<PodStatus> {
        self.simulate_latency().await;

        let mut state = self.lock();
        let mut next = state.next_container;

        let pod = state
            .pods
            .get_mut(&key(namespace, name))
            .ok_or_else(|| not_found(namespace, name))?;

        if pod.status.phase == PodPhase::Pending {
            pod.reads += 1;
            match pod.startup {
                Startup::Immediate => start(pod, &mut next),
                Startup::AfterReads(n) if pod.reads > n => start(pod, &mut next),
                Startup::FailAfterReads(n) if pod.reads > n => pod.status.phase = PodPhase::Failed,
                _ => {}
            }
        }

        let status = pod.status.clone();
        state.next_container = next;
        Ok(status)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodStatus>> {
        self.simulate_latency().await;

        Ok(self
            .lock()
            .pods
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, pod)| pod.status.clone())
            .collect())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<()> {
        self.simulate_latency().await;

        let mut state = self.lock();
        if state.fail_deletes.iter().any(|n| n == name) {
            return Err(ProxyError::Backend(format!(
                "Failed to delete pod {}/{}: injected failure",
                namespace, name
            )));
        }

        state
            .pods
            .remove(&key(namespace, name))
            .map(|_| ())
            .ok_or_else(|| not_found(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PodConfig;
    use crate::pod::PodSpecBuilder;
    use podproxy_common::{LaunchRequest, PodType};

    fn spec(name: &str) -> PodSpec {
        let request =
            LaunchRequest::new(name, vec!["w.py".to_string()], Default::default(), PodType::Worker)
                .unwrap();
        PodSpecBuilder::new("default", PodConfig::default()).build(&request)
    }

    #[tokio::test]
    async fn test_pod_starts_after_reads() {
        let backend = MemoryBackend::new(Startup::AfterReads(2));
        backend.create_pod(&spec("w1")).await.unwrap();

        for _ in 0..2 {
            let status = backend.read_pod_status("default", "w1").await.unwrap();
            assert_eq!(status.phase, PodPhase::Pending);
            assert!(status.container_statuses.is_empty());
        }

        let status = backend.read_pod_status("default", "w1").await.unwrap();
        assert_eq!(status.phase, PodPhase::Running);
        assert!(status.container_id("container-w1").is_some());
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let backend = MemoryBackend::default();
        backend.create_pod(&spec("w1")).await.unwrap();

        let err = backend.create_pod(&spec("w1")).await.unwrap_err();
        assert!(matches!(err, ProxyError::AlreadyExists { .. }));
        assert_eq!(backend.create_calls(), 2);
        assert_eq!(backend.pod_names("default"), vec!["w1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let backend = MemoryBackend::default();
        let err = backend.delete_pod("default", "ghost").await.unwrap_err();
        assert!(matches!(err, ProxyError::PodNotFound { .. }));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend = MemoryBackend::default();
        backend.create_pod(&spec("w1")).await.unwrap();

        assert!(backend.list_pods("other").await.unwrap().is_empty());
        assert_eq!(backend.list_pods("default").await.unwrap().len(), 1);
        assert!(backend.read_pod_status("other", "w1").await.is_err());
    }
}
