//! podproxy-ctl - talk to a podproxy from a cluster node
//!
//! Commands:
//! - `podproxy-ctl launch -- CMD...` - Create a pod running CMD with this process's `RAY_` environment
//! - `podproxy-ctl kill NAME` - Delete a pod
//! - `podproxy-ctl killall` - Delete every pod in the proxy's namespace
//! - `podproxy-ctl container-id NAME` - Print the main container's runtime id

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use podproxy_cli::{collect_prefixed_envs, generate_worker_name, ProxyClient};
use podproxy_common::{LaunchRequest, LogRedirect, PodType, ProxyResponse};

#[derive(Parser)]
#[command(name = "podproxy-ctl")]
#[command(about = "Launch and inspect worker pods through podproxy", long_about = None)]
#[command(version)]
struct Cli {
    /// Proxy address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:22222", global = true)]
    proxy: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a pod for a command line
    Launch {
        /// Pod name; generated from the host name when omitted
        #[arg(short, long)]
        name: Option<String>,

        /// Kind of process the pod runs
        #[arg(short = 't', long = "type", value_enum, default_value = "worker")]
        pod_type: TypeArg,

        /// File receiving the process's stdout (non-worker pods)
        #[arg(long, requires = "stderr")]
        stdout: Option<String>,

        /// File receiving the process's stderr (non-worker pods)
        #[arg(long, requires = "stdout")]
        stderr: Option<String>,

        /// Command line to run in the pod
        #[arg(last = true, required = true)]
        cmdline: Vec<String>,
    },
    /// Delete a pod
    Kill {
        name: String,
    },
    /// Delete every pod in the proxy's namespace
    Killall,
    /// Print the runtime id of a pod's main container
    ContainerId {
        name: String,

        /// Drop the runtime scheme, e.g. `docker://`
        #[arg(long)]
        strip_scheme: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum TypeArg {
    Worker,
    Other,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut client = ProxyClient::connect(&cli.proxy)
        .await
        .with_context(|| format!("Failed to connect to proxy at {}", cli.proxy))?;

    match cli.command {
        Commands::Launch {
            name,
            pod_type,
            stdout,
            stderr,
            cmdline,
        } => {
            let name = match name {
                Some(name) => name,
                None => {
                    let host = hostname::get()
                        .map(|h| h.to_string_lossy().to_string())
                        .unwrap_or_default();
                    generate_worker_name(&host)
                }
            };
            let pod_type = match pod_type {
                TypeArg::Worker => PodType::Worker,
                TypeArg::Other => PodType::Other,
            };

            let envs = collect_prefixed_envs(std::env::vars());
            let mut request = LaunchRequest::new(name.clone(), cmdline, envs, pod_type)
                .context("Invalid launch request")?;
            if let (Some(stdout), Some(stderr)) = (stdout, stderr) {
                request = request.with_log_redirect(LogRedirect { stdout, stderr });
            }

            let response = client.create(request).await?;
            report(response)?;
            println!("{}", name);
        }
        Commands::Kill { name } => report(client.delete(&name).await?)?,
        Commands::Killall => report(client.delete_all().await?)?,
        Commands::ContainerId { name, strip_scheme } => {
            match client.resolve_container_id(&name).await? {
                ProxyResponse::Value { value } => {
                    let id = if strip_scheme {
                        value.split("://").last().unwrap_or(&value)
                    } else {
                        value.as_str()
                    };
                    println!("{}", id);
                }
                other => report(other)?,
            }
        }
    }

    Ok(())
}

fn report(response: ProxyResponse) -> Result<()> {
    match response {
        ProxyResponse::Success { detail } => {
            if let Some(detail) = detail {
                eprintln!("{}", detail);
            }
            Ok(())
        }
        ProxyResponse::Value { value } => {
            println!("{}", value);
            Ok(())
        }
        ProxyResponse::Error { kind, message } => bail!("{} ({})", message, kind),
    }
}
