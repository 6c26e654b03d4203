//! Connection dispatcher
//!
//! One listener task accepts connections; each connection gets its own task
//! that reads length-delimited JSON commands, runs them against the shared
//! [`PodManager`](crate::lifecycle::PodManager) in arrival order and writes
//! one response per command.

pub mod connection;
pub mod dispatch;
pub mod listener;

pub use connection::handle_connection;
pub use dispatch::dispatch;
pub use listener::ProxyServer;
