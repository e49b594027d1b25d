use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use driftfs::config::{self, StorageConfig};
use driftfs::storage::StorageServer;
use tracing_subscriber::EnvFilter;

/// Runs a driftfs storage server over a local directory.
#[derive(Parser)]
struct Args {
    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory to serve; overrides the configuration file.
    #[arg(long)]
    root: Option<PathBuf>,
    /// Registration endpoint of the naming server; overrides the file.
    #[arg(long)]
    naming: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut config = match args.config {
        Some(path) => config::load_storage(&path).expect("load configuration"),
        None => {
            let root = args.root.clone().expect("--root or --config is required");
            let naming = args.naming.expect("--naming or --config is required");
            StorageConfig::new(root, naming)
        }
    };
    if let Some(root) = args.root {
        config.root = root;
    }
    if let Some(naming) = args.naming {
        config.naming = naming;
    }

    let server = StorageServer::new(config);
    let endpoints = server.start().await.expect("start storage server");
    println!("storage server: storage {} command {}", endpoints.storage, endpoints.command);

    tokio::signal::ctrl_c().await.expect("wait for interrupt");
    server.stop().await;
}
