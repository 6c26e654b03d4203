//! Maps a [`LaunchRequest`] to a [`PodSpec`]
//!
//! The builder is pure: no I/O, no shared state, same input gives the same
//! pod. Input validation already happened while decoding the request.

use crate::config::PodConfig;
use crate::pod::spec::{
    main_container_name, sidecar_container_name, ContainerRole, ContainerSpec, HostNamespaces,
    PodSpec, RestartPolicy, SecurityContext, VolumeMount, VolumeSpec, LOG_VOLUME, SHARED_VOLUME,
};
use podproxy_common::{LaunchRequest, LogRedirect, PodType};

/// Rewrites the launching host's runtime prefix to the in-container one.
///
/// Both prefixes are compared without trailing slashes, so
/// `/opt/conda/bin/python` with host `/opt/conda/` and container
/// `/usr/local/` becomes `/usr/local/bin/python`. An occurrence is replaced
/// only when it ends a path segment, so `/opt/conda3` is left alone while
/// `/opt/conda`, `/opt/conda/lib` and `/opt/conda:/x` are rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewriter {
    host: Option<String>,
    container: String,
}

impl PathRewriter {
    pub fn new(host: Option<&str>, container: &str) -> Self {
        let host = host
            .map(|h| h.trim_end_matches('/').to_string())
            .filter(|h| !h.is_empty());

        Self {
            host,
            container: container.trim_end_matches('/').to_string(),
        }
    }

    pub fn rewrite(&self, value: &str) -> String {
        match &self.host {
            Some(host) if host != &self.container => {
                replace_segments(value, host, &self.container)
            }
            _ => value.to_string(),
        }
    }
}

fn replace_segments(value: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(pos) = rest.find(from) {
        let end = pos + from.len();
        let ends_segment = rest[end..]
            .chars()
            .next()
            .map_or(true, |c| !is_path_name_char(c));

        out.push_str(&rest[..pos]);
        out.push_str(if ends_segment { to } else { from });
        rest = &rest[end..];
    }

    out.push_str(rest);
    out
}

fn is_path_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

#[derive(Debug, Clone)]
pub struct PodSpecBuilder {
    namespace: String,
    config: PodConfig,
    rewriter: PathRewriter,
}

impl PodSpecBuilder {
    pub fn new(namespace: impl Into<String>, config: PodConfig) -> Self {
        let rewriter = PathRewriter::new(
            config.host_runtime_prefix.as_deref(),
            &config.container_runtime_prefix,
        );

        Self {
            namespace: namespace.into(),
            config,
            rewriter,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn build(&self, request: &LaunchRequest) -> PodSpec {
        let name = request.name();

        let args: Vec<String> = request
            .command()
            .iter()
            .map(|arg| self.rewriter.rewrite(arg))
            .collect();

        let env: Vec<(String, String)> = request
            .environment()
            .iter()
            .map(|(key, value)| (key.clone(), self.rewriter.rewrite(value)))
            .collect();

        let command = match request.pod_type() {
            PodType::Worker => vec![self.config.runtime_entrypoint.clone()],
            PodType::Other => Vec::new(),
        };

        let main = ContainerSpec {
            role: ContainerRole::Main,
            name: main_container_name(name),
            image: self.config.image.clone(),
            image_pull_policy: self.config.image_pull_policy.clone(),
            command,
            args,
            env,
            volume_mounts: vec![self.shared_mount()],
            security_context: self.security_context(),
        };

        let mut volumes = vec![VolumeSpec {
            name: SHARED_VOLUME.to_string(),
            host_path: self.config.shared_mount_path.clone(),
        }];

        let sidecar = match (request.pod_type(), request.log_redirect()) {
            (PodType::Other, Some(redirect)) => {
                volumes.push(VolumeSpec {
                    name: LOG_VOLUME.to_string(),
                    host_path: self.config.log_storage_root.clone(),
                });
                Some(self.sidecar(name, redirect))
            }
            _ => None,
        };

        PodSpec {
            name: name.to_string(),
            namespace: self.namespace.clone(),
            main,
            sidecar,
            volumes,
            restart_policy: RestartPolicy::Never,
            host_namespaces: HostNamespaces::shared(),
        }
    }

    fn sidecar(&self, pod_name: &str, redirect: &LogRedirect) -> ContainerSpec {
        ContainerSpec {
            role: ContainerRole::Sidecar,
            name: sidecar_container_name(pod_name),
            image: self.config.image.clone(),
            image_pull_policy: self.config.image_pull_policy.clone(),
            command: vec![self.config.runtime_entrypoint.clone()],
            args: vec![
                self.config.logger_script.clone(),
                redirect.stdout.clone(),
                redirect.stderr.clone(),
                pod_name.to_string(),
            ],
            env: Vec::new(),
            volume_mounts: vec![
                self.shared_mount(),
                VolumeMount {
                    volume: LOG_VOLUME.to_string(),
                    mount_path: self.config.log_storage_root.clone(),
                    read_only: true,
                },
            ],
            security_context: self.security_context(),
        }
    }

    fn shared_mount(&self) -> VolumeMount {
        VolumeMount {
            volume: SHARED_VOLUME.to_string(),
            mount_path: self.config.shared_mount_path.clone(),
            read_only: false,
        }
    }

    // Privileged with a fixed non-root identity so files written to the
    // shared volume match the host's ownership.
    fn security_context(&self) -> SecurityContext {
        SecurityContext {
            privileged: true,
            run_as_user: self.config.run_as_user,
            run_as_group: self.config.run_as_group,
        }
    }
}
