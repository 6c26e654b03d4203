use crate::{ProxyError, Result};
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};

/// Proxy-wide counters.
///
/// Cloning shares the underlying metrics; every update is atomic, so
/// connection handlers record into them without extra locking.
#[derive(Clone)]
pub struct ProxyMetrics {
    registry: Registry,
    pub commands: IntCounterVec,
    pub active_connections: IntGauge,
    pub pods_created: IntCounter,
    pub pods_deleted: IntCounter,
}

impl ProxyMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let commands = IntCounterVec::new(
            Opts::new("podproxy_commands_total", "Commands handled, by verb and outcome"),
            &["command", "outcome"],
        )
        .map_err(metrics_error)?;
        let active_connections = IntGauge::new(
            "podproxy_active_connections",
            "Connections currently being served",
        )
        .map_err(metrics_error)?;
        let pods_created =
            IntCounter::new("podproxy_pods_created_total", "Pods created").map_err(metrics_error)?;
        let pods_deleted =
            IntCounter::new("podproxy_pods_deleted_total", "Pods deleted").map_err(metrics_error)?;

        registry
            .register(Box::new(commands.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(active_connections.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(pods_created.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(pods_deleted.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            commands,
            active_connections,
            pods_created,
            pods_deleted,
        })
    }

    pub fn record_command(&self, command: &str, outcome: &str) {
        self.commands.with_label_values(&[command, outcome]).inc();
    }

    pub fn command_count(&self, command: &str, outcome: &str) -> u64 {
        self.commands.with_label_values(&[command, outcome]).get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

fn metrics_error(e: prometheus::Error) -> ProxyError {
    ProxyError::MetricsError(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = ProxyMetrics::new().unwrap();
        let handle = metrics.clone();

        handle.record_command("create", "success");
        handle.record_command("create", "success");
        handle.record_command("get_mainid", "timeout");
        handle.pods_created.inc();

        assert_eq!(metrics.command_count("create", "success"), 2);
        assert_eq!(metrics.command_count("get_mainid", "timeout"), 1);
        assert_eq!(metrics.command_count("kill", "success"), 0);
        assert_eq!(metrics.pods_created.get(), 1);
    }
}
