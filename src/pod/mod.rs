//! Pod description model and the pure builder that produces it

pub mod builder;
pub mod spec;

pub use builder::{PathRewriter, PodSpecBuilder};
pub use spec::{
    main_container_name, sidecar_container_name, ContainerRole, ContainerSpec, HostNamespaces,
    PodSpec, RestartPolicy, SecurityContext, VolumeMount, VolumeSpec,
};
