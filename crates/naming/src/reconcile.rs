use common::{CommandEndpoint, DfsError, DfsResult, Path, StorageEndpoint};

use crate::tree::TreeIndex;

/// Reconcile a newly joined storage server's advertised file list against
/// the existing namespace.
///
/// For each path the server claims to hold: if a peer already owns it,
/// the path is added to the returned pruning list (the caller, i.e. the
/// storage server, is contractually required to delete it locally);
/// otherwise it is admitted as a fresh key in the tree index. Ancestors
/// of admitted files are not inserted — they remain implicit directories
/// discovered by containment checks.
pub fn register(
    tree: &mut TreeIndex,
    storage: StorageEndpoint,
    command: CommandEndpoint,
    files: &[Path],
) -> DfsResult<Vec<Path>> {
    if tree.is_known_storage(&storage) {
        return Err(DfsError::AlreadyRegistered(storage.to_string()));
    }
    if tree.is_known_command(&command) {
        return Err(DfsError::AlreadyRegistered(command.to_string()));
    }

    let mut pruned = Vec::new();
    for f in files {
        if f.is_root() {
            continue;
        }
        if tree.contains(f) {
            pruned.push(f.clone());
        } else {
            tree.insert_new(f, storage, command);
        }
    }

    tree.admit(storage, command);
    Ok(pruned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn endpoints(port: u16) -> (StorageEndpoint, CommandEndpoint) {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        (StorageEndpoint::new(addr), CommandEndpoint::new(addr))
    }

    fn paths(strs: &[&str]) -> Vec<Path> {
        strs.iter().map(|s| Path::parse(s).unwrap()).collect()
    }

    #[test]
    fn s1_registration_with_pruning() {
        let mut tree = TreeIndex::new();
        let (sa, ca) = endpoints(9000);
        let (sb, cb) = endpoints(9001);

        let pruned_a = register(&mut tree, sa, ca, &paths(&["/", "/a", "/b/c"])).unwrap();
        assert!(pruned_a.is_empty());

        let pruned_b = register(&mut tree, sb, cb, &paths(&["/", "/a", "/d"])).unwrap();
        assert_eq!(pruned_b, paths(&["/a"]));

        let mut names = tree.list(&Path::root()).unwrap();
        names.sort();
        assert_eq!(names, vec!["a", "b", "d"]);
    }

    #[test]
    fn double_registration_of_same_storage_is_rejected() {
        let mut tree = TreeIndex::new();
        let (s, c) = endpoints(9000);
        register(&mut tree, s, c, &paths(&["/a"])).unwrap();

        let (s2, c2) = endpoints(9002);
        let err = register(&mut tree, s, c2, &paths(&["/b"])).unwrap_err();
        assert!(matches!(err, DfsError::AlreadyRegistered(_)));

        let err = register(&mut tree, s2, c, &paths(&["/b"])).unwrap_err();
        assert!(matches!(err, DfsError::AlreadyRegistered(_)));
    }

    #[test]
    fn ancestors_of_admitted_files_are_not_inserted_as_keys() {
        let mut tree = TreeIndex::new();
        let (s, c) = endpoints(9000);
        register(&mut tree, s, c, &paths(&["/b/c"])).unwrap();
        // /b is present only by inference, not as a direct storage_map key
        assert_eq!(tree.default_storage(&Path::parse("/b").unwrap()), None);
        assert!(tree.is_directory(&Path::parse("/b").unwrap()).unwrap());
    }
}
