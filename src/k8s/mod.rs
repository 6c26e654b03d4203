pub mod backend;
pub mod client;
pub mod memory;
pub mod types;

pub use backend::PodBackend;
pub use client::KubeBackend;
pub use memory::{MemoryBackend, Startup};
pub use types::{to_k8s_pod, PodPhase, PodStatus};
