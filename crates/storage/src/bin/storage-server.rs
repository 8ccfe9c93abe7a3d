use std::net::SocketAddr;
use std::path::{Path as StdPath, PathBuf};

use anyhow::Context;
use clap::Parser;
use common::wire::{RegistrationRequest, RegistrationResponse};
use common::{CommandEndpoint, DfsError, StorageEndpoint};
use tracing_subscriber::EnvFilter;

/// Storage server process: walks its root directory, registers with the
/// naming server, then binds the Storage (client-facing) and Command
/// (naming-server-facing) endpoints.
#[derive(Debug, Parser)]
#[command(name = "storage-server")]
struct Cli {
    /// Local directory this server serves files out of. Created if absent.
    #[arg(long)]
    root: PathBuf,

    /// Address the client-facing Storage interface listens on.
    #[arg(long, default_value = "127.0.0.1:9100")]
    storage_addr: SocketAddr,

    /// Address the naming-server-facing Command interface listens on.
    #[arg(long, default_value = "127.0.0.1:9101")]
    command_addr: SocketAddr,

    /// Registration endpoint of the naming server to join.
    #[arg(long, default_value = "127.0.0.1:9001")]
    naming_registration_addr: SocketAddr,

    /// `compact` (default) or `json`. Overridden by `DFS_LOG_FORMAT` if set.
    #[arg(long, value_parser = ["compact", "json"])]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format.as_deref());

    std::fs::create_dir_all(&cli.root).context("creating storage root")?;
    let files = walk_files(&cli.root).context("scanning storage root")?;
    let logical_files = files
        .iter()
        .map(|f| to_logical(&cli.root, f))
        .collect::<anyhow::Result<Vec<_>>>()?;

    tracing::info!(
        root = %cli.root.display(),
        file_count = logical_files.len(),
        naming_registration_addr = %cli.naming_registration_addr,
        "registering with naming server"
    );

    let register_req = RegistrationRequest::Register {
        storage: StorageEndpoint::new(cli.storage_addr),
        command: CommandEndpoint::new(cli.command_addr),
        files: logical_files,
    };
    let resp: RegistrationResponse = rpc::call(cli.naming_registration_addr, &register_req)
        .await
        .context("registering with naming server")?;
    let RegistrationResponse::Register(result) = resp;
    let pruned = result.map_err(DfsError::from)?;

    for p in &pruned {
        let local = p.to_local_file(&cli.root);
        tracing::info!(path = %p, "pruning file already owned by a peer storage server");
        let _ = tokio::fs::remove_file(&local).await;
    }

    tracing::info!(
        storage_addr = %cli.storage_addr,
        command_addr = %cli.command_addr,
        "starting storage server"
    );

    let server = storage::StorageServer::new(cli.root.clone());
    storage::server::run(cli.storage_addr, cli.command_addr, server)
        .await
        .context("storage server exited")?;
    Ok(())
}

fn walk_files(root: &StdPath) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    Ok(out)
}

fn to_logical(root: &StdPath, file: &StdPath) -> anyhow::Result<common::Path> {
    let rel = file.strip_prefix(root)?;
    let components = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());
    common::Path::from_components(components).map_err(Into::into)
}

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
