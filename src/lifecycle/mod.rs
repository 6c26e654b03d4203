//! Pod lifecycle management
//!
//! Every mutation and every readiness check goes straight to the backend;
//! nothing about pods is cached in the proxy.

pub mod manager;
pub mod poll;

pub use manager::{ContainerId, CreateOutcome, DeleteAllSummary, DeleteOutcome, PodManager};
pub use poll::{poll_until, Attempt, PollOutcome, RetryPolicy};
