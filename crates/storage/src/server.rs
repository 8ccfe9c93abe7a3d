//! Binds a storage server's two TCP endpoints — Storage (client-facing
//! data interface) and Command (naming-server-facing control interface)
//! — over one local root directory.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use common::wire::{CommandRequest, CommandResponse, StorageRequest, StorageResponse};
use common::{DfsResult, WireResult};

use crate::primitives;

pub struct StorageServer {
    root: PathBuf,
}

impl StorageServer {
    pub fn new(root: PathBuf) -> Arc<Self> {
        Arc::new(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }
}

/// Run both endpoints until either listener errors.
pub async fn run(
    storage_addr: SocketAddr,
    command_addr: SocketAddr,
    server: Arc<StorageServer>,
) -> DfsResult<()> {
    let storage = {
        let server = Arc::clone(&server);
        rpc::serve(storage_addr, move |req| {
            let server = Arc::clone(&server);
            async move { dispatch_storage(&server, req).await }
        })
    };
    let command = {
        let server = Arc::clone(&server);
        rpc::serve(command_addr, move |req| {
            let server = Arc::clone(&server);
            async move { dispatch_command(&server, req).await }
        })
    };

    tokio::try_join!(storage, command)?;
    Ok(())
}

async fn dispatch_storage(server: &StorageServer, req: StorageRequest) -> StorageResponse {
    match req {
        StorageRequest::Size { path } => {
            StorageResponse::Size(wire(primitives::size(server.root(), &path).await))
        }
        StorageRequest::Read {
            path,
            offset,
            length,
        } => StorageResponse::Read(wire(
            primitives::read(server.root(), &path, offset, length).await,
        )),
        StorageRequest::Write {
            path,
            offset,
            data,
        } => StorageResponse::Write(wire(
            primitives::write(server.root(), &path, offset, &data).await,
        )),
    }
}

async fn dispatch_command(server: &StorageServer, req: CommandRequest) -> CommandResponse {
    match req {
        CommandRequest::Create { path } => {
            CommandResponse::Create(wire(primitives::create(server.root(), &path).await))
        }
        CommandRequest::Delete { path } => {
            CommandResponse::Delete(wire(primitives::delete(server.root(), &path).await))
        }
        CommandRequest::Copy { path, peer } => {
            CommandResponse::Copy(wire(primitives::copy(server.root(), &path, peer).await))
        }
    }
}

fn wire<T>(result: DfsResult<T>) -> WireResult<T> {
    result.map_err(Into::into)
}
