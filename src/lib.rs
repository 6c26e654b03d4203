pub mod cli;
pub mod config;
pub mod error;
pub mod k8s;
pub mod lifecycle;
pub mod metrics;
pub mod pod;
pub mod server;

pub use config::ProxyConfig;
pub use error::{ProxyError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
