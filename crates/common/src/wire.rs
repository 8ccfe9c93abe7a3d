//! Request/response payloads for the four RPC interfaces this workspace
//! ships: Service and Registration (naming server), Storage and Command
//! (storage servers). Kept in `common` so the naming server, the storage
//! server, and `dfsctl` can all build and interpret them without a
//! dependency cycle.

use serde::{Deserialize, Serialize};

use crate::{CommandEndpoint, Path, StorageEndpoint, WireResult};

/// Client-facing naming server interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceRequest {
    Lock { path: Path, exclusive: bool },
    Unlock { path: Path, exclusive: bool },
    IsDirectory { path: Path },
    List { path: Path },
    CreateFile { path: Path },
    CreateDirectory { path: Path },
    Delete { path: Path },
    GetStorage { path: Path },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceResponse {
    Unit(WireResult<()>),
    Bool(WireResult<bool>),
    Names(WireResult<Vec<String>>),
    Storage(WireResult<StorageEndpoint>),
}

/// Storage-facing naming server interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistrationRequest {
    Register {
        storage: StorageEndpoint,
        command: CommandEndpoint,
        files: Vec<Path>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RegistrationResponse {
    Register(WireResult<Vec<Path>>),
}

/// Naming-server-facing control interface exposed by each storage
/// server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandRequest {
    Create { path: Path },
    Delete { path: Path },
    Copy { path: Path, peer: StorageEndpoint },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandResponse {
    Create(WireResult<bool>),
    Delete(WireResult<bool>),
    Copy(WireResult<()>),
}

/// Client-facing data interface exposed by each storage server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageRequest {
    Size { path: Path },
    Read { path: Path, offset: u64, length: u32 },
    Write { path: Path, offset: u64, data: Vec<u8> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StorageResponse {
    Size(WireResult<u64>),
    Read(WireResult<Vec<u8>>),
    Write(WireResult<()>),
}
