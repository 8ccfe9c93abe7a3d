use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use naming::server;
use naming::service::NamingServer;
use tracing_subscriber::EnvFilter;

/// Naming server process: binds the Service (client-facing) and
/// Registration (storage-server-facing) endpoints.
#[derive(Debug, Parser)]
#[command(name = "naming-server")]
struct Cli {
    /// Address the client-facing Service interface listens on.
    #[arg(long, default_value = "127.0.0.1:9000")]
    service_addr: SocketAddr,

    /// Address the storage-server-facing Registration interface listens on.
    #[arg(long, default_value = "127.0.0.1:9001")]
    registration_addr: SocketAddr,

    /// `compact` (default) or `json`. Overridden by `DFS_LOG_FORMAT` if set.
    #[arg(long, value_parser = ["compact", "json"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format.as_deref());

    tracing::info!(
        service_addr = %cli.service_addr,
        registration_addr = %cli.registration_addr,
        "starting naming server"
    );

    let state = NamingServer::new();
    server::run(cli.service_addr, cli.registration_addr, state)
        .await
        .context("naming server exited")?;
    Ok(())
}

/// `compact` human-readable output by default; `json` when either the
/// `--log-format json` flag or the `DFS_LOG_FORMAT=json` environment
/// variable is set. The flag takes precedence over the environment.
fn init_tracing(format: Option<&str>) {
    let format = format
        .map(str::to_string)
        .or_else(|| std::env::var("DFS_LOG_FORMAT").ok())
        .unwrap_or_else(|| "compact".to_string());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.compact().init();
    }
}
