use std::fs;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Once;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use common::wire::{ServiceRequest, ServiceResponse, StorageRequest, StorageResponse};
use common::{DfsError, Path, StorageEndpoint, COPY_CHUNK_SIZE};
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let format = std::env::var("DFS_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

        if format.eq_ignore_ascii_case("json") {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .json()
                .flatten_event(true)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_target(true)
                .compact()
                .init();
        }
    });
}

#[derive(Parser)]
#[command(name = "dfsctl")]
#[command(about = "Distributed filesystem control utility", long_about = None)]
struct Cli {
    /// Naming server's client-facing Service endpoint.
    #[arg(long, global = true, default_value = "127.0.0.1:9000")]
    naming: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a directory
    Mkdir {
        #[arg(short, long)]
        path: String,
    },
    /// Create an empty file
    Touch {
        #[arg(short, long)]
        path: String,
    },
    /// List the entries beneath a directory
    Ls {
        #[arg(short, long, default_value = "/")]
        path: String,
    },
    /// Read a file and stream it to stdout
    Cat {
        #[arg(short, long)]
        path: String,
    },
    /// Write a local file's contents into the namespace
    Put {
        #[arg(short, long)]
        path: String,
        /// Source file on the local filesystem
        #[arg(short, long)]
        file: String,
    },
    /// Remove a file or directory
    Rm {
        #[arg(short, long)]
        path: String,
    },
    /// Show whether a path is a file or directory, and its storage endpoint
    Stat {
        #[arg(short, long)]
        path: String,
    },
}

async fn mkdir(naming: SocketAddr, path: &Path) -> Result<bool> {
    let resp: ServiceResponse = rpc::call(
        naming,
        &ServiceRequest::CreateDirectory { path: path.clone() },
    )
    .await?;
    match resp {
        ServiceResponse::Bool(result) => Ok(result.map_err(DfsError::from)?),
        _ => bail!("unexpected response to createDirectory"),
    }
}

async fn touch(naming: SocketAddr, path: &Path) -> Result<bool> {
    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::CreateFile { path: path.clone() }).await?;
    match resp {
        ServiceResponse::Bool(result) => Ok(result.map_err(DfsError::from)?),
        _ => bail!("unexpected response to createFile"),
    }
}

async fn ls(naming: SocketAddr, path: &Path) -> Result<Vec<String>> {
    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::List { path: path.clone() }).await?;
    match resp {
        ServiceResponse::Names(result) => Ok(result.map_err(DfsError::from)?),
        _ => bail!("unexpected response to list"),
    }
}

async fn rm(naming: SocketAddr, path: &Path) -> Result<bool> {
    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::Delete { path: path.clone() }).await?;
    match resp {
        ServiceResponse::Bool(result) => Ok(result.map_err(DfsError::from)?),
        _ => bail!("unexpected response to delete"),
    }
}

async fn stat(naming: SocketAddr, path: &Path) -> Result<(bool, Option<StorageEndpoint>)> {
    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::IsDirectory { path: path.clone() }).await?;
    let is_dir = match resp {
        ServiceResponse::Bool(result) => result.map_err(DfsError::from)?,
        _ => bail!("unexpected response to isDirectory"),
    };

    if is_dir {
        return Ok((true, None));
    }

    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::GetStorage { path: path.clone() }).await?;
    let storage = match resp {
        ServiceResponse::Storage(result) => result.map_err(DfsError::from)?,
        _ => bail!("unexpected response to getStorage"),
    };
    Ok((false, Some(storage)))
}

async fn resolve_storage(naming: SocketAddr, path: &Path) -> Result<StorageEndpoint> {
    let resp: ServiceResponse =
        rpc::call(naming, &ServiceRequest::GetStorage { path: path.clone() }).await?;
    match resp {
        ServiceResponse::Storage(result) => Ok(result.map_err(DfsError::from)?),
        _ => bail!("unexpected response to getStorage"),
    }
}

async fn cat(naming: SocketAddr, path: &Path) -> Result<Vec<u8>> {
    let storage = resolve_storage(naming, path).await?;

    let resp: StorageResponse =
        rpc::call(storage.addr(), &StorageRequest::Size { path: path.clone() }).await?;
    let total = match resp {
        StorageResponse::Size(result) => result.map_err(DfsError::from)?,
        _ => bail!("unexpected response to size"),
    };

    let mut out = Vec::with_capacity(total as usize);
    let mut offset = 0u64;
    while offset < total {
        let length = std::cmp::min(COPY_CHUNK_SIZE as u64, total - offset) as u32;
        let resp: StorageResponse = rpc::call(
            storage.addr(),
            &StorageRequest::Read {
                path: path.clone(),
                offset,
                length,
            },
        )
        .await?;
        let bytes = match resp {
            StorageResponse::Read(result) => result.map_err(DfsError::from)?,
            _ => bail!("unexpected response to read"),
        };
        out.extend_from_slice(&bytes);
        offset += u64::from(length);
    }
    Ok(out)
}

async fn put(naming: SocketAddr, path: &Path, data: &[u8]) -> Result<()> {
    touch(naming, path).await?;
    let storage = resolve_storage(naming, path).await?;

    for (chunk_index, chunk) in data.chunks(COPY_CHUNK_SIZE).enumerate() {
        let offset = (chunk_index * COPY_CHUNK_SIZE) as u64;
        let resp: StorageResponse = rpc::call(
            storage.addr(),
            &StorageRequest::Write {
                path: path.clone(),
                offset,
                data: chunk.to_vec(),
            },
        )
        .await?;
        match resp {
            StorageResponse::Write(result) => result.map_err(DfsError::from)?,
            _ => bail!("unexpected response to write"),
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let naming = cli.naming;
    let rt = Runtime::new()?;

    rt.block_on(async move {
        match cli.command {
            Commands::Mkdir { path } => {
                let path = Path::parse(&path)?;
                let created = mkdir(naming, &path).await?;
                println!(
                    "{}",
                    if created {
                        format!("created directory {path}")
                    } else {
                        format!("{path} already exists")
                    }
                );
            }
            Commands::Touch { path } => {
                let path = Path::parse(&path)?;
                let created = touch(naming, &path).await?;
                println!(
                    "{}",
                    if created {
                        format!("created file {path}")
                    } else {
                        format!("{path} already exists")
                    }
                );
            }
            Commands::Ls { path } => {
                let path = Path::parse(&path)?;
                let entries = ls(naming, &path).await?;
                if entries.is_empty() {
                    println!("(empty directory)");
                } else {
                    for name in entries {
                        println!("{name}");
                    }
                }
            }
            Commands::Cat { path } => {
                let path = Path::parse(&path)?;
                let data = cat(naming, &path).await?;
                io::stdout().write_all(&data)?;
            }
            Commands::Put { path, file } => {
                let path = Path::parse(&path)?;
                let data = fs::read(&file)?;
                put(naming, &path, &data).await?;
                println!("wrote {path} from {file}");
            }
            Commands::Rm { path } => {
                let path = Path::parse(&path)?;
                let removed = rm(naming, &path).await?;
                println!(
                    "{}",
                    if removed {
                        format!("removed {path}")
                    } else {
                        format!("{path} was not found")
                    }
                );
            }
            Commands::Stat { path } => {
                let path = Path::parse(&path)?;
                let (is_dir, storage) = stat(naming, &path).await?;
                if is_dir {
                    println!("{path}: directory");
                } else {
                    println!("{path}: file, storage={}", storage.unwrap());
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    })
}
