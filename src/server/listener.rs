use crate::lifecycle::PodManager;
use crate::metrics::ProxyMetrics;
use crate::server::connection::handle_connection;
use crate::Result;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Pause after a failed accept so fd exhaustion does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct ProxyServer {
    listener: TcpListener,
    manager: Arc<PodManager>,
    metrics: ProxyMetrics,
    max_frame_length: usize,
}

impl ProxyServer {
    pub async fn bind(
        addr: SocketAddr,
        manager: Arc<PodManager>,
        metrics: ProxyMetrics,
        max_frame_length: usize,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, namespace = manager.namespace(), "Proxy listening");

        Ok(Self {
            listener,
            manager,
            metrics,
            max_frame_length,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Accept connections until `shutdown` completes.
    ///
    /// Handlers already running are left to finish on their own.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_handler(stream, peer),
                    Err(e) => accept_failed(&e).await,
                }
            }
        }
    }

    fn spawn_handler(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        debug!(%peer, "Accepted connection");

        let manager = self.manager.clone();
        let metrics = self.metrics.clone();
        let max_frame_length = self.max_frame_length;

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer, manager, metrics, max_frame_length).await
            {
                error!(%peer, error = %e, "Connection handler failed");
            }
        });
    }
}

async fn accept_failed(e: &io::Error) {
    warn!(error = %e, backoff_ms = ACCEPT_BACKOFF.as_millis() as u64, "Failed to accept connection");
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_accept_error_backs_off() {
        let started = Instant::now();
        accept_failed(&io::Error::from_raw_os_error(24)).await;
        assert!(started.elapsed() >= ACCEPT_BACKOFF);
    }
}
