use crate::cli::{Commands, PodTypeArg};
use crate::config::ProxyConfig;
use crate::k8s::{to_k8s_pod, KubeBackend, MemoryBackend, PodBackend};
use crate::lifecycle::PodManager;
use crate::metrics::{render, ProxyMetrics};
use crate::pod::PodSpecBuilder;
use crate::server::ProxyServer;
use crate::{ProxyError, Result};
use podproxy_common::{LaunchRequest, LogRedirect};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn handle_command(command: Commands, config: ProxyConfig) -> Result<()> {
    match command {
        Commands::Serve {
            listen,
            namespace,
            dry_run,
        } => handle_serve(config, listen, namespace, dry_run).await,
        Commands::Render {
            name,
            pod_type,
            stdout,
            stderr,
            envs,
            cmdline,
        } => handle_render(&config, name, pod_type, stdout.zip(stderr), envs, cmdline),
    }
}

async fn handle_serve(
    mut config: ProxyConfig,
    listen: Option<SocketAddr>,
    namespace: Option<String>,
    dry_run: bool,
) -> Result<()> {
    if let Some(listen) = listen {
        config.listen = listen;
    }
    if let Some(namespace) = namespace {
        config.namespace = namespace;
    }
    config.validate()?;

    let backend: Arc<dyn PodBackend> = if dry_run {
        warn!("Dry run: pods are kept in memory, nothing reaches the cluster");
        Arc::new(MemoryBackend::default())
    } else {
        Arc::new(KubeBackend::try_default().await?)
    };

    let metrics = ProxyMetrics::new()?;
    let builder = PodSpecBuilder::new(config.namespace.clone(), config.pod.clone());
    let manager = Arc::new(PodManager::new(
        backend,
        builder,
        &config.polling,
        metrics.clone(),
    ));

    let server = ProxyServer::bind(
        config.listen,
        manager,
        metrics.clone(),
        config.max_frame_length,
    )
    .await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    info!("Final metrics:\n{}", render(&metrics)?);
    Ok(())
}

fn handle_render(
    config: &ProxyConfig,
    name: String,
    pod_type: PodTypeArg,
    log_files: Option<(String, String)>,
    envs: Vec<(String, String)>,
    cmdline: Vec<String>,
) -> Result<()> {
    let environment: BTreeMap<String, String> = envs.into_iter().collect();
    let mut request = LaunchRequest::new(name, cmdline, environment, pod_type.into())?;
    if let Some((stdout, stderr)) = log_files {
        request = request.with_log_redirect(LogRedirect { stdout, stderr });
    }

    let spec = PodSpecBuilder::new(config.namespace.clone(), config.pod.clone()).build(&request);
    let manifest = serde_yaml::to_string(&to_k8s_pod(&spec))
        .map_err(|e| ProxyError::ConfigError(format!("Failed to render manifest: {}", e)))?;

    print!("{}", manifest);
    Ok(())
}
