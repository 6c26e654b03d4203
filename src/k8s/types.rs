use crate::pod::{ContainerSpec, PodSpec, VolumeMount as MountSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, HostPathVolumeSource, Pod, PodSpec as K8sPodSpec, SecurityContext, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub const MANAGED_BY: &str = "podproxy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodPhase {
    Pending,
    Running,
    Failed,
    Other,
}

impl PodPhase {
    pub fn from_k8s(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Failed") => PodPhase::Failed,
            _ => PodPhase::Other,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Failed => "Failed",
            PodPhase::Other => "Other",
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Read-only projection of a pod's observed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodStatus {
    pub name: String,
    pub phase: PodPhase,
    pub pod_ip: Option<String>,
    /// Container name -> runtime container id, only for started containers
    pub container_statuses: BTreeMap<String, String>,
}

impl PodStatus {
    pub fn from_k8s_pod(pod: &Pod) -> Self {
        let status = pod.status.as_ref();

        let container_statuses = status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .filter_map(|cs| {
                        cs.container_id
                            .as_ref()
                            .filter(|id| !id.is_empty())
                            .map(|id| (cs.name.clone(), id.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: PodPhase::from_k8s(status.and_then(|s| s.phase.as_deref())),
            pod_ip: status.and_then(|s| s.pod_ip.clone()),
            container_statuses,
        }
    }

    pub fn container_id(&self, container: &str) -> Option<&str> {
        self.container_statuses.get(container).map(String::as_str)
    }
}

/// Render a [`PodSpec`] as the Kubernetes object submitted to the API server.
pub fn to_k8s_pod(spec: &PodSpec) -> Pod {
    let host = spec.host_namespaces();

    let volumes = spec
        .volumes()
        .iter()
        .map(|v| Volume {
            name: v.name.clone(),
            host_path: Some(HostPathVolumeSource {
                path: v.host_path.clone(),
                type_: None,
            }),
            ..Default::default()
        })
        .collect();

    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());

    Pod {
        metadata: ObjectMeta {
            name: Some(spec.name().to_string()),
            namespace: Some(spec.namespace().to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        spec: Some(K8sPodSpec {
            containers: spec.containers().map(to_k8s_container).collect(),
            volumes: Some(volumes),
            restart_policy: Some(spec.restart_policy().as_str().to_string()),
            host_pid: Some(host.use_host_pid),
            host_ipc: Some(host.use_host_ipc),
            host_network: Some(host.use_host_network),
            host_users: Some(host.use_host_users),
            ..Default::default()
        }),
        status: None,
    }
}

fn to_k8s_container(container: &ContainerSpec) -> Container {
    let env = container
        .env
        .iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            value_from: None,
        })
        .collect();

    Container {
        name: container.name.clone(),
        image: Some(container.image.clone()),
        image_pull_policy: Some(container.image_pull_policy.clone()),
        command: non_empty(&container.command),
        args: non_empty(&container.args),
        env: Some(env),
        volume_mounts: Some(container.volume_mounts.iter().map(to_k8s_mount).collect()),
        security_context: Some(SecurityContext {
            privileged: Some(container.security_context.privileged),
            run_as_user: Some(container.security_context.run_as_user),
            run_as_group: Some(container.security_context.run_as_group),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn to_k8s_mount(mount: &MountSpec) -> VolumeMount {
    VolumeMount {
        name: mount.volume.clone(),
        mount_path: mount.mount_path.clone(),
        read_only: mount.read_only.then_some(true),
        ..Default::default()
    }
}

// An empty command must be omitted so the image entrypoint still runs.
fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}
