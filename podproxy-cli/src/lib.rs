//! Client side of podproxy
//!
//! Used on cluster nodes to ask the proxy for pods:
//! - [`ProxyClient`] speaks the framed wire protocol
//! - [`collect_prefixed_envs`] picks the environment a worker inherits
//! - [`generate_worker_name`] derives a valid pod name for a new worker

pub mod client;
pub mod launch;

pub use client::{ClientError, ProxyClient};
pub use launch::{collect_prefixed_envs, generate_worker_name, WORKER_SUFFIX_LEN};
