//! Storage server core: local-filesystem data primitives and the
//! Storage/Command RPC endpoints built on top of them.

pub mod primitives;
pub mod server;

pub use server::StorageServer;
