pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use podproxy_common::PodType;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "podproxy")]
#[command(author = "Ignoramuss")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cluster-local proxy that launches and inspects worker pods on Kubernetes", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to a YAML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the proxy")]
    Serve {
        #[arg(short, long, help = "Listen address (host:port)")]
        listen: Option<SocketAddr>,

        #[arg(short, long, help = "Kubernetes namespace for worker pods")]
        namespace: Option<String>,

        #[arg(long, help = "Use an in-memory backend instead of a cluster")]
        dry_run: bool,
    },
    #[command(about = "Print the pod manifest a create request would submit")]
    Render {
        #[arg(long, help = "Pod name")]
        name: String,

        #[arg(short = 't', long = "type", value_enum, default_value = "worker", help = "Pod type")]
        pod_type: PodTypeArg,

        #[arg(long, requires = "stderr", help = "File receiving the main container's stdout")]
        stdout: Option<String>,

        #[arg(long, requires = "stdout", help = "File receiving the main container's stderr")]
        stderr: Option<String>,

        #[arg(short, long = "env", value_parser = parse_env, help = "Environment variable KEY=VALUE")]
        envs: Vec<(String, String)>,

        #[arg(last = true, required = true, help = "Command line to run")]
        cmdline: Vec<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum PodTypeArg {
    Worker,
    Other,
}

impl From<PodTypeArg> for PodType {
    fn from(arg: PodTypeArg) -> Self {
        match arg {
            PodTypeArg::Worker => PodType::Worker,
            PodTypeArg::Other => PodType::Other,
        }
    }
}

fn parse_env(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {:?}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from(["podproxy", "serve", "--listen", "127.0.0.1:9000", "--dry-run"]);
        match cli.command {
            Some(Commands::Serve {
                listen, dry_run, ..
            }) => {
                assert_eq!(listen, Some("127.0.0.1:9000".parse().unwrap()));
                assert!(dry_run);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from([
            "podproxy", "render", "--name", "raylet-1", "--type", "other", "--stdout", "o",
            "--stderr", "e", "-e", "RAY_JOB_ID=01", "--", "raylet", "--port=0",
        ]);
        match cli.command {
            Some(Commands::Render {
                name,
                envs,
                cmdline,
                stdout,
                ..
            }) => {
                assert_eq!(name, "raylet-1");
                assert_eq!(envs, vec![("RAY_JOB_ID".to_string(), "01".to_string())]);
                assert_eq!(cmdline, vec!["raylet".to_string(), "--port=0".to_string()]);
                assert_eq!(stdout.as_deref(), Some("o"));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_parse_env_requires_separator() {
        assert!(parse_env("RAY_X").is_err());
        assert_eq!(
            parse_env("RAY_X=a=b").unwrap(),
            ("RAY_X".to_string(), "a=b".to_string())
        );
    }
}
