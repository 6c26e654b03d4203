use crate::metrics::collector::ProxyMetrics;
use crate::{ProxyError, Result};
use prometheus::{Encoder, TextEncoder};

/// Render all proxy metrics in the Prometheus text exposition format.
pub fn render(metrics: &ProxyMetrics) -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metrics.registry().gather(), &mut buffer)
        .map_err(|e| ProxyError::MetricsError(e.to_string()))?;

    String::from_utf8(buffer).map_err(|e| ProxyError::MetricsError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_counters() {
        let metrics = ProxyMetrics::new().unwrap();
        metrics.record_command("killall", "success");
        metrics.active_connections.inc();

        let text = render(&metrics).unwrap();
        assert!(text.contains("# TYPE podproxy_commands_total counter"));
        assert!(text.contains("podproxy_commands_total{command=\"killall\",outcome=\"success\"} 1"));
        assert!(text.contains("podproxy_active_connections 1"));
    }
}
