//! Backend-neutral pod description
//!
//! A [`PodSpec`] always holds exactly one main container and at most one
//! sidecar; the shape is enforced by the struct rather than checked later.

/// Shared scratch directory visible to every container of the pod
pub const SHARED_VOLUME: &str = "ray-volume";

/// Container runtime log storage, mounted into the sidecar only
pub const LOG_VOLUME: &str = "log-volume";

pub fn main_container_name(pod_name: &str) -> String {
    format!("container-{}", pod_name)
}

pub fn sidecar_container_name(pod_name: &str) -> String {
    format!("sidecar-{}", pod_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerRole {
    /// Runs the worker process itself
    Main,
    /// Tails the main container's logs into the caller's files
    Sidecar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
}

impl RestartPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RestartPolicy::Never => "Never",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeSpec {
    pub name: String,
    pub host_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub volume: String,
    pub mount_path: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityContext {
    pub privileged: bool,
    pub run_as_user: i64,
    pub run_as_group: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostNamespaces {
    pub use_host_pid: bool,
    pub use_host_ipc: bool,
    pub use_host_network: bool,
    pub use_host_users: bool,
}

impl HostNamespaces {
    /// Workers share every host namespace with the node that launched them.
    pub const fn shared() -> Self {
        Self {
            use_host_pid: true,
            use_host_ipc: true,
            use_host_network: true,
            use_host_users: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub role: ContainerRole,
    pub name: String,
    pub image: String,
    pub image_pull_policy: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub volume_mounts: Vec<VolumeMount>,
    pub security_context: SecurityContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodSpec {
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) main: ContainerSpec,
    pub(crate) sidecar: Option<ContainerSpec>,
    pub(crate) volumes: Vec<VolumeSpec>,
    pub(crate) restart_policy: RestartPolicy,
    pub(crate) host_namespaces: HostNamespaces,
}

impl PodSpec {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn main_container(&self) -> &ContainerSpec {
        &self.main
    }

    pub fn sidecar(&self) -> Option<&ContainerSpec> {
        self.sidecar.as_ref()
    }

    /// Containers in submission order: main first, then the sidecar.
    pub fn containers(&self) -> impl Iterator<Item = &ContainerSpec> {
        std::iter::once(&self.main).chain(self.sidecar.iter())
    }

    pub fn volumes(&self) -> &[VolumeSpec] {
        &self.volumes
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    pub fn host_namespaces(&self) -> HostNamespaces {
        self.host_namespaces
    }
}
