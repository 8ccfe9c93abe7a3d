//! Local-filesystem data operations backing the Storage and Command
//! RPC interfaces. Every function takes the storage server's configured
//! root directory and a logical [`Path`]; all of a server's files live
//! under that root, joined via [`Path::to_local_file`].

use std::path::Path as StdPath;

use common::{DfsError, DfsResult, Path, StorageEndpoint};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use common::wire::{StorageRequest, StorageResponse};

async fn stat(local: &StdPath, logical: &Path) -> DfsResult<std::fs::Metadata> {
    match tokio::fs::metadata(local).await {
        Ok(meta) => Ok(meta),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DfsError::NotFound(logical.to_wire_string()))
        }
        Err(e) => Err(DfsError::Io(e)),
    }
}

/// File length. `NotFound` if missing or a directory.
pub async fn size(root: &StdPath, p: &Path) -> DfsResult<u64> {
    let local = p.to_local_file(root);
    let meta = stat(&local, p).await?;
    if meta.is_dir() {
        return Err(DfsError::NotFound(p.to_wire_string()));
    }
    Ok(meta.len())
}

/// Exactly `length` bytes starting at `offset`. `IndexOutOfBounds` if the
/// file is shorter than `offset + length`; `NotFound` if absent or a
/// directory.
pub async fn read(root: &StdPath, p: &Path, offset: u64, length: u32) -> DfsResult<Vec<u8>> {
    let local = p.to_local_file(root);
    let meta = stat(&local, p).await?;
    if meta.is_dir() {
        return Err(DfsError::NotFound(p.to_wire_string()));
    }
    if meta.len() < offset.saturating_add(u64::from(length)) {
        return Err(DfsError::IndexOutOfBounds(format!(
            "{p}: read offset={offset} length={length} exceeds size={}",
            meta.len()
        )));
    }

    let mut file = tokio::fs::File::open(&local).await.map_err(DfsError::Io)?;
    file.seek(std::io::SeekFrom::Start(offset))
        .await
        .map_err(DfsError::Io)?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf).await.map_err(DfsError::Io)?;
    Ok(buf)
}

/// Write `data` at `offset`, extending the file as needed. `NotFound` if
/// absent or a directory.
pub async fn write(root: &StdPath, p: &Path, offset: u64, data: &[u8]) -> DfsResult<()> {
    let local = p.to_local_file(root);
    let meta = stat(&local, p).await?;
    if meta.is_dir() {
        return Err(DfsError::NotFound(p.to_wire_string()));
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .open(&local)
        .await
        .map_err(DfsError::Io)?;
    file.seek(std::io::SeekFrom::Start(offset))
        .await
        .map_err(DfsError::Io)?;
    file.write_all(data).await.map_err(DfsError::Io)?;
    Ok(())
}

/// Idempotently create parent directories, then create an empty regular
/// file at `p`. `false` (not an error) if the file already exists. Never
/// creates root.
pub async fn create(root: &StdPath, p: &Path) -> DfsResult<bool> {
    if p.is_root() {
        return Ok(false);
    }
    let local = p.to_local_file(root);
    if let Some(parent) = local.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DfsError::Io)?;
    }
    match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&local)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(DfsError::Io(e)),
    }
}

/// Recursively delete at `p`. Refuses root. `true` iff the subtree is
/// absent after the call (so deleting an already-absent path is not an
/// error).
pub async fn delete(root: &StdPath, p: &Path) -> DfsResult<bool> {
    if p.is_root() {
        return Ok(false);
    }
    let local = p.to_local_file(root);
    match tokio::fs::metadata(&local).await {
        Ok(meta) if meta.is_dir() => {
            tokio::fs::remove_dir_all(&local).await.map_err(DfsError::Io)?;
        }
        Ok(_) => {
            tokio::fs::remove_file(&local).await.map_err(DfsError::Io)?;
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DfsError::Io(e)),
    }
    Ok(!tokio::fs::try_exists(&local).await.unwrap_or(true))
}

/// Read the whole file from `peer`'s Storage interface in
/// [`common::COPY_CHUNK_SIZE`]-byte chunks, writing contiguously into the
/// local file. Any I/O or transport failure deletes the partial file
/// before the error propagates.
pub async fn copy(root: &StdPath, p: &Path, peer: StorageEndpoint) -> DfsResult<()> {
    let local = p.to_local_file(root);
    if let Some(parent) = local.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DfsError::Io)?;
    }

    let result = copy_inner(&local, p, peer).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(&local).await;
    }
    result
}

async fn copy_inner(local: &StdPath, p: &Path, peer: StorageEndpoint) -> DfsResult<()> {
    let size_resp: StorageResponse =
        rpc::call(peer.addr(), &StorageRequest::Size { path: p.clone() }).await?;
    let total = match size_resp {
        StorageResponse::Size(result) => result?,
        _ => return Err(DfsError::Transport("unexpected response to size".into())),
    };

    let mut file = tokio::fs::File::create(local).await.map_err(DfsError::Io)?;
    let mut offset = 0u64;
    while offset < total {
        let chunk_len = std::cmp::min(common::COPY_CHUNK_SIZE as u64, total - offset) as u32;
        let read_resp: StorageResponse = rpc::call(
            peer.addr(),
            &StorageRequest::Read {
                path: p.clone(),
                offset,
                length: chunk_len,
            },
        )
        .await?;
        let bytes = match read_resp {
            StorageResponse::Read(result) => result?,
            _ => return Err(DfsError::Transport("unexpected response to read".into())),
        };
        file.write_all(&bytes).await.map_err(DfsError::Io)?;
        offset += u64::from(chunk_len);
    }
    Ok(())
}
