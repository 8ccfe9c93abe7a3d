//! Binds the naming server's two TCP endpoints — Service (client-facing)
//! and Registration (storage-server-facing) — onto one [`NamingServer`].

use std::net::SocketAddr;
use std::sync::Arc;

use common::wire::{
    RegistrationRequest, RegistrationResponse, ServiceRequest, ServiceResponse,
};
use common::{DfsResult, WireResult};

use crate::service::NamingServer;

/// Run both endpoints until either listener errors. Intended to be
/// raced inside `tokio::select!` or `tokio::try_join!` by the binary.
pub async fn run(
    service_addr: SocketAddr,
    registration_addr: SocketAddr,
    server: Arc<NamingServer>,
) -> DfsResult<()> {
    let service = {
        let server = Arc::clone(&server);
        rpc::serve(service_addr, move |req| {
            let server = Arc::clone(&server);
            async move { dispatch_service(&server, req).await }
        })
    };
    let registration = {
        let server = Arc::clone(&server);
        rpc::serve(registration_addr, move |req| {
            let server = Arc::clone(&server);
            async move { dispatch_registration(&server, req).await }
        })
    };

    tokio::try_join!(service, registration)?;
    Ok(())
}

async fn dispatch_service(server: &Arc<NamingServer>, req: ServiceRequest) -> ServiceResponse {
    match req {
        ServiceRequest::Lock { path, exclusive } => {
            ServiceResponse::Unit(wire(server.lock(&path, exclusive).await))
        }
        ServiceRequest::Unlock { path, exclusive } => {
            ServiceResponse::Unit(wire(server.unlock(&path, exclusive).await))
        }
        ServiceRequest::IsDirectory { path } => {
            ServiceResponse::Bool(wire(server.is_directory(&path).await))
        }
        ServiceRequest::List { path } => ServiceResponse::Names(wire(server.list(&path).await)),
        ServiceRequest::CreateFile { path } => {
            ServiceResponse::Bool(wire(server.create_file(&path).await))
        }
        ServiceRequest::CreateDirectory { path } => {
            ServiceResponse::Bool(wire(server.create_directory(&path).await))
        }
        ServiceRequest::Delete { path } => ServiceResponse::Bool(wire(server.delete(&path).await)),
        ServiceRequest::GetStorage { path } => {
            ServiceResponse::Storage(wire(server.get_storage(&path).await))
        }
    }
}

async fn dispatch_registration(
    server: &Arc<NamingServer>,
    req: RegistrationRequest,
) -> RegistrationResponse {
    match req {
        RegistrationRequest::Register {
            storage,
            command,
            files,
        } => {
            tracing::info!(%storage, %command, file_count = files.len(), "storage server registering");
            RegistrationResponse::Register(wire(server.register(storage, command, &files).await))
        }
    }
}

fn wire<T>(result: DfsResult<T>) -> WireResult<T> {
    result.map_err(Into::into)
}
