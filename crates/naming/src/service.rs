//! The naming server's dispatcher: the single `Mutex<NamingState>` that
//! guards the directory tree and the lock queue, plus the operations
//! that run under it.
//!
//! Suspension only happens inside [`NamingServer::lock`], waiting on
//! [`Notify`] for an earlier conflicting holder to release. Every other
//! operation takes the mutex, does its work, and releases it — except
//! the outbound Command RPCs in [`NamingServer::create_file`],
//! [`NamingServer::delete`], and the replication task, which are issued
//! with the mutex dropped: take it, decide what to call, drop it, make
//! the call, reacquire it, mutate the index.

use std::sync::Arc;

use common::wire::{CommandRequest, CommandResponse};
use common::{DfsError, DfsResult, Path};
use tokio::sync::{Mutex, Notify};

use crate::lock::Admission;
use crate::lock::LockQueue;
use crate::reconcile;
use crate::replication;
use crate::tree::TreeIndex;
use common::{CommandEndpoint, StorageEndpoint};

struct NamingState {
    tree: TreeIndex,
    queue: LockQueue,
}

/// Shared naming-server state. Cheap to clone (`Arc`); RPC handlers hold
/// one of these each.
pub struct NamingServer {
    state: Mutex<NamingState>,
    notify: Notify,
}

impl NamingServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(NamingState {
                tree: TreeIndex::new(),
                queue: LockQueue::new(),
            }),
            notify: Notify::new(),
        })
    }

    /// Acquire a lock on `path`. Blocks (by suspending on [`Notify`])
    /// until no earlier-enqueued request conflicts, per the §4.3
    /// conflict table, or the path vanishes while waiting.
    pub async fn lock(&self, path: &Path, exclusive: bool) -> DfsResult<()> {
        let id = {
            let mut guard = self.state.lock().await;
            guard.queue.enqueue(path.clone(), exclusive)
        };

        loop {
            let notified = self.notify.notified();
            let mut guard = self.state.lock().await;
            let NamingState { tree, queue } = &mut *guard;
            match queue.try_admit(id, |p| tree.contains(p)) {
                Admission::Granted => {
                    if !exclusive {
                        let count = tree.record_access(path);
                        if replication::crosses_threshold(count) {
                            self.spawn_replication(path.clone());
                        }
                    }
                    return Ok(());
                }
                Admission::Abandoned => {
                    return Err(DfsError::NotFound(path.to_wire_string()));
                }
                Admission::Blocked => {
                    drop(guard);
                    notified.await;
                }
            }
        }
    }

    /// Release a previously granted `(path, exclusive)` lock and wake
    /// every waiter so they may re-evaluate admission.
    pub async fn unlock(&self, path: &Path, exclusive: bool) -> DfsResult<()> {
        let released = {
            let mut guard = self.state.lock().await;
            guard.queue.release(path, exclusive)
        };
        if !released {
            return Err(DfsError::IllegalArgument(format!(
                "no held lock for {path} exclusive={exclusive}"
            )));
        }
        self.notify.notify_waiters();
        Ok(())
    }

    /// `isDirectory` takes a shared lock on `path` for the duration of
    /// the index read, per the dispatcher table.
    pub async fn is_directory(self: &Arc<Self>, path: &Path) -> DfsResult<bool> {
        self.lock(path, false).await?;
        let result = {
            let guard = self.state.lock().await;
            guard.tree.is_directory(path)
        };
        self.unlock(path, false).await?;
        result
    }

    /// `list` reads the index directly; no lock is taken.
    pub async fn list(&self, dir: &Path) -> DfsResult<Vec<String>> {
        let guard = self.state.lock().await;
        guard.tree.list(dir)
    }

    /// `getStorage` reads the index directly; no lock is taken.
    pub async fn get_storage(&self, path: &Path) -> DfsResult<StorageEndpoint> {
        let guard = self.state.lock().await;
        if !guard.tree.contains(path) || guard.tree.is_directory(path)? {
            return Err(DfsError::NotFound(path.to_wire_string()));
        }
        guard
            .tree
            .default_storage(path)
            .ok_or_else(|| DfsError::NotFound(path.to_wire_string()))
    }

    pub async fn create_file(&self, path: &Path) -> DfsResult<bool> {
        if path.is_root() {
            return Ok(false);
        }

        let (storage, command) = {
            let guard = self.state.lock().await;
            if guard.tree.contains(path) {
                return Ok(false);
            }
            let parent = path.parent().expect("non-root path has a parent");
            if !guard.tree.is_directory(&parent)? {
                return Err(DfsError::NotFound(parent.to_wire_string()));
            }
            let storage = guard
                .tree
                .ancestor_storage(&parent)
                .ok_or(DfsError::NoStorages)?;
            let command = guard
                .tree
                .ancestor_command(&parent)
                .ok_or(DfsError::NoStorages)?;
            (storage, command)
        };

        let created = self.invoke_create(command, path).await?;
        if created {
            let mut guard = self.state.lock().await;
            guard.tree.insert_new(path, storage, command);
        }
        Ok(created)
    }

    pub async fn create_directory(&self, dir: &Path) -> DfsResult<bool> {
        if dir.is_root() {
            return Ok(false);
        }

        let mut guard = self.state.lock().await;
        if guard.tree.contains(dir) {
            return Ok(false);
        }
        let parent = dir.parent().expect("non-root path has a parent");
        if !guard.tree.is_directory(&parent)? {
            return Err(DfsError::NotFound(parent.to_wire_string()));
        }
        let storage = guard
            .tree
            .ancestor_storage(&parent)
            .ok_or(DfsError::NoStorages)?;
        let command = guard
            .tree
            .ancestor_command(&parent)
            .ok_or(DfsError::NoStorages)?;
        guard.tree.insert_new(dir, storage, command);
        guard.tree.mark_created_directory(dir);
        Ok(true)
    }

    pub async fn delete(&self, path: &Path) -> DfsResult<bool> {
        if path.is_root() {
            return Ok(false);
        }

        let command = {
            let guard = self.state.lock().await;
            if !guard.tree.contains(path) {
                return Err(DfsError::NotFound(path.to_wire_string()));
            }
            guard
                .tree
                .ancestor_command(path)
                .ok_or_else(|| DfsError::NotFound(path.to_wire_string()))?
        };

        let req = CommandRequest::Delete { path: path.clone() };
        let resp: CommandResponse = rpc::call(command.addr(), &req).await?;
        let deleted = match resp {
            CommandResponse::Delete(result) => result?,
            _ => {
                return Err(DfsError::Transport(
                    "unexpected response to delete".to_string(),
                ))
            }
        };

        if deleted {
            let mut guard = self.state.lock().await;
            guard.tree.remove(path);
        }
        Ok(deleted)
    }

    /// Entry point for the registration RPC: reconcile a storage
    /// server's file list against the index, admitting it as a known
    /// server regardless of outcome.
    pub async fn register(
        &self,
        storage: StorageEndpoint,
        command: CommandEndpoint,
        files: &[Path],
    ) -> DfsResult<Vec<Path>> {
        let mut guard = self.state.lock().await;
        reconcile::register(&mut guard.tree, storage, command, files)
    }

    async fn invoke_create(&self, command: CommandEndpoint, path: &Path) -> DfsResult<bool> {
        let req = CommandRequest::Create { path: path.clone() };
        let resp: CommandResponse = rpc::call(command.addr(), &req).await?;
        match resp {
            CommandResponse::Create(result) => Ok(result?),
            _ => Err(DfsError::Transport(
                "unexpected response to create".to_string(),
            )),
        }
    }

    /// Spawn the replication attempt triggered by a shared-lock access
    /// count crossing a threshold. Runs independently of the caller;
    /// acquires the mutex itself before reading or mutating the index,
    /// and never holds it across the outbound `copy` RPC.
    fn spawn_replication(self: &Arc<Self>, path: Path) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            server.replicate_once(&path).await;
        });
    }

    async fn replicate_once(&self, path: &Path) {
        let (target_storage, target_command, peer_storage) = {
            let guard = self.state.lock().await;
            let Some((ts, tc)) = replication::choose_replication_target(&guard.tree, path) else {
                return;
            };
            let Some(peer) = guard.tree.default_storage(path) else {
                return;
            };
            (ts, tc, peer)
        };

        let req = CommandRequest::Copy {
            path: path.clone(),
            peer: peer_storage,
        };
        let resp: DfsResult<CommandResponse> = rpc::call(target_command.addr(), &req).await;
        match resp {
            Ok(CommandResponse::Copy(Ok(()))) => {
                let mut guard = self.state.lock().await;
                guard.tree.add_replica(path, target_storage, target_command);
            }
            Ok(CommandResponse::Copy(Err(err))) => {
                tracing::warn!(%path, %target_command, error = ?err, "replication copy rejected");
            }
            Ok(_) => {
                tracing::warn!(%path, %target_command, "unexpected response to replication copy");
            }
            Err(err) => {
                tracing::warn!(%path, %target_command, %err, "replication copy failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicU16, Ordering};

    use common::wire::{CommandRequest as Req, CommandResponse as Resp};

    static NEXT_PORT: AtomicU16 = AtomicU16::new(19500);

    fn reserve_addr() -> SocketAddr {
        let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    /// A stub command endpoint that always reports success, standing in
    /// for a storage server's Command interface in dispatcher-level
    /// tests.
    async fn spawn_stub_command(addr: SocketAddr) {
        tokio::spawn(rpc::serve(addr, |req: Req| async move {
            match req {
                Req::Create { .. } => Resp::Create(Ok(true)),
                Req::Delete { .. } => Resp::Delete(Ok(true)),
                Req::Copy { .. } => Resp::Copy(Ok(())),
            }
        }));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[tokio::test]
    async fn create_file_requires_a_registered_storage() {
        let server = NamingServer::new();
        let err = server.create_file(&p("/a")).await.unwrap_err();
        assert!(matches!(err, DfsError::NoStorages));
    }

    #[tokio::test]
    async fn s1_create_then_disambiguate() {
        let addr = reserve_addr();
        spawn_stub_command(addr).await;
        let server = NamingServer::new();
        server
            .register(StorageEndpoint::new(addr), CommandEndpoint::new(addr), &[])
            .await
            .unwrap();

        assert!(server.create_file(&p("/a")).await.unwrap());
        assert!(!server.create_file(&p("/a")).await.unwrap());
        assert!(!server.is_directory(&p("/a")).await.unwrap());
        assert!(server.get_storage(&p("/a")).await.is_ok());
    }

    #[tokio::test]
    async fn create_directory_then_list_is_empty_no_remote_call() {
        let server = NamingServer::new();
        // createDirectory never calls out, so it works with zero
        // registered servers as long as an endpoint was admitted.
        let addr = reserve_addr();
        server
            .register(
                StorageEndpoint::new(addr),
                CommandEndpoint::new(addr),
                &[],
            )
            .await
            .unwrap();

        assert!(server.create_directory(&p("/x")).await.unwrap());
        assert!(!server.create_directory(&p("/x")).await.unwrap());
        assert!(server.list(&p("/x")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_the_subtree() {
        let addr = reserve_addr();
        spawn_stub_command(addr).await;
        let server = NamingServer::new();
        server
            .register(StorageEndpoint::new(addr), CommandEndpoint::new(addr), &[])
            .await
            .unwrap();
        server.create_file(&p("/a")).await.unwrap();

        assert!(server.delete(&p("/a")).await.unwrap());
        assert!(server.get_storage(&p("/a")).await.is_err());
    }

    #[tokio::test]
    async fn exclusive_locks_on_the_same_path_serialize() {
        let server = NamingServer::new();
        server.lock(&Path::root(), true).await.unwrap();

        let waiter_server = Arc::clone(&server);
        let waiter = tokio::spawn(async move {
            waiter_server.lock(&Path::root(), true).await.unwrap();
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        server.unlock(&Path::root(), true).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_millis(200), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
