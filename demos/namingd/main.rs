use std::path::PathBuf;

use clap::Parser;
use driftfs::config::{self, NamingConfig};
use driftfs::naming::NamingServer;
use tracing_subscriber::EnvFilter;

/// Runs the driftfs naming server.
#[derive(Parser)]
struct Args {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let config = match args.config {
        Some(path) => config::load_naming(&path).expect("load configuration"),
        None => NamingConfig::default(),
    };

    let server = NamingServer::new(config);
    server.start().await.expect("start naming server");
    println!(
        "naming server: service {} registration {}",
        server.service_addr().await.expect("service address"),
        server.registration_addr().await.expect("registration address"),
    );

    tokio::signal::ctrl_c().await.expect("wait for interrupt");
    server.stop().await;
}
