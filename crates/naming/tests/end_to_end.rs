//! Naming server driving real storage-server processes end to end:
//! createFile/delete actually touch disk, and registration reconciles
//! pre-existing files across two independently started servers.

use std::net::SocketAddr;
use std::path::PathBuf;

use common::{CommandEndpoint, Path, StorageEndpoint};
use naming::service::NamingServer;

struct TempDir(PathBuf);

impl TempDir {
    fn path(&self) -> &std::path::Path {
        &self.0
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn tempdir(tag: &str) -> TempDir {
    let mut dir = std::env::temp_dir();
    dir.push(format!("dfs-naming-e2e-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    TempDir(dir)
}

async fn reserve_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

async fn spawn_storage(root: PathBuf) -> (StorageEndpoint, CommandEndpoint) {
    let storage_addr = reserve_addr().await;
    let command_addr = reserve_addr().await;
    let server = storage::StorageServer::new(root);
    tokio::spawn(storage::server::run(storage_addr, command_addr, server));
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
    (
        StorageEndpoint::new(storage_addr),
        CommandEndpoint::new(command_addr),
    )
}

fn p(s: &str) -> Path {
    Path::parse(s).unwrap()
}

#[tokio::test]
async fn create_file_through_naming_writes_to_the_real_storage_server() {
    let dir = tempdir("create");
    let (storage, command) = spawn_storage(dir.path().to_path_buf()).await;

    let naming = NamingServer::new();
    naming.register(storage, command, &[]).await.unwrap();

    assert!(naming.create_file(&p("/a")).await.unwrap());
    assert!(dir.path().join("a").is_file());
    assert_eq!(naming.get_storage(&p("/a")).await.unwrap(), storage);
}

#[tokio::test]
async fn delete_through_naming_removes_the_file_on_disk() {
    let dir = tempdir("delete");
    let (storage, command) = spawn_storage(dir.path().to_path_buf()).await;

    let naming = NamingServer::new();
    naming.register(storage, command, &[]).await.unwrap();
    naming.create_file(&p("/a")).await.unwrap();

    assert!(naming.delete(&p("/a")).await.unwrap());
    assert!(!dir.path().join("a").exists());
    assert!(naming.get_storage(&p("/a")).await.is_err());
}

#[tokio::test]
async fn registration_reconciles_pre_existing_files_across_two_servers() {
    let dir_a = tempdir("reg-a");
    let dir_b = tempdir("reg-b");
    std::fs::write(dir_a.path().join("shared"), b"from a").unwrap();
    std::fs::write(dir_b.path().join("shared"), b"from b").unwrap();

    let (storage_a, command_a) = spawn_storage(dir_a.path().to_path_buf()).await;
    let (storage_b, command_b) = spawn_storage(dir_b.path().to_path_buf()).await;

    let naming = NamingServer::new();
    naming
        .register(storage_a, command_a, &[p("/shared")])
        .await
        .unwrap();
    let pruned = naming
        .register(storage_b, command_b, &[p("/shared")])
        .await
        .unwrap();

    assert_eq!(pruned, vec![p("/shared")]);
    assert_eq!(naming.get_storage(&p("/shared")).await.unwrap(), storage_a);
}

#[tokio::test]
async fn create_directory_then_list_then_create_nested_file() {
    let dir = tempdir("nested");
    let (storage, command) = spawn_storage(dir.path().to_path_buf()).await;

    let naming = NamingServer::new();
    naming.register(storage, command, &[]).await.unwrap();

    assert!(naming.create_directory(&p("/x")).await.unwrap());
    assert!(naming.create_file(&p("/x/y")).await.unwrap());

    let mut names = naming.list(&p("/x")).await.unwrap();
    names.sort();
    assert_eq!(names, vec!["y"]);
    assert!(dir.path().join("x").join("y").is_file());
}
