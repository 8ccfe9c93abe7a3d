use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// A remote handle for client-facing file I/O on a particular storage
/// server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageEndpoint(pub SocketAddr);

/// A remote handle for naming-server-initiated control operations
/// (create/delete/copy) on a particular storage server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommandEndpoint(pub SocketAddr);

macro_rules! endpoint_boilerplate {
    ($ty:ident) => {
        impl $ty {
            pub fn new(addr: SocketAddr) -> Self {
                Self(addr)
            }

            pub fn addr(&self) -> SocketAddr {
                self.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<SocketAddr> for $ty {
            fn from(addr: SocketAddr) -> Self {
                Self(addr)
            }
        }
    };
}

endpoint_boilerplate!(StorageEndpoint);
endpoint_boilerplate!(CommandEndpoint);
