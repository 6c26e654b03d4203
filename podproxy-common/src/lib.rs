//! Wire vocabulary shared between podproxy and the cluster nodes that call it
//!
//! Both sides exchange length-delimited frames holding UTF-8 JSON:
//! - requests decode into a [`ProxyCommand`]
//! - responses are a tagged [`ProxyResponse`]
//!
//! Nothing in this crate performs I/O.

pub mod name;
pub mod request;
pub mod response;
pub mod wire;

pub use name::{normalize_name, validate_name, MAX_NAME_LEN};
pub use request::{LaunchRequest, LogRedirect, PodType};
pub use response::{ErrorKind, ProxyResponse};
pub use wire::{DecodeError, ProxyCommand, WireMessage, WireParams};

/// Only environment variables carrying this prefix travel into worker pods.
pub const ENV_PREFIX: &str = "RAY_";

/// Upper bound on a single frame unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Port the proxy listens on unless configured otherwise.
pub const DEFAULT_PROXY_PORT: u16 = 22222;
