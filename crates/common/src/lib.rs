pub mod endpoint;
pub mod error;
pub mod path;
pub mod wire;

pub use endpoint::{CommandEndpoint, StorageEndpoint};
pub use error::{DfsError, DfsResult, WireError, WireResult};
pub use path::Path;

/// Shared-lock reads after which the replication controller is asked to
/// add one more replica for the accessed path.
pub const REPLICATION_THRESHOLD: u64 = 20;

/// Chunk size used by `copy(p, peer)` when streaming a file from a peer
/// storage server.
pub const COPY_CHUNK_SIZE: usize = 1024;
