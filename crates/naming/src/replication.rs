use common::{CommandEndpoint, Path, StorageEndpoint};

use crate::tree::TreeIndex;

/// Shared-lock reads after which a path becomes eligible for an extra
/// replica. Re-exported here under the name the replication controller
/// uses; matches [`common::REPLICATION_THRESHOLD`].
pub const REPLICATION_THRESHOLD: u64 = common::REPLICATION_THRESHOLD;

/// `true` iff `count` is a positive multiple of [`REPLICATION_THRESHOLD`],
/// i.e. the access that produced `count` should trigger a replication
/// attempt.
pub fn crosses_threshold(count: u64) -> bool {
    count > 0 && count % REPLICATION_THRESHOLD == 0
}

/// Pick a registered storage server that does not yet hold `path`, to be
/// instructed to `copy(path, current_replica)`. Returns `None` if every
/// known server already holds a copy (including when none are
/// registered) — the guaranteed no-op fallback.
///
/// Pure selection only: performing the actual `copy` RPC happens without
/// holding the index's mutex (see the naming server's concurrency
/// discipline), and [`TreeIndex::add_replica`] is applied afterwards on
/// success.
pub fn choose_replication_target(
    tree: &TreeIndex,
    path: &Path,
) -> Option<(StorageEndpoint, CommandEndpoint)> {
    let current = tree.replicas(path);
    tree.known_servers()
        .iter()
        .find(|(storage, _)| !current.contains(storage))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn ep(port: u16) -> (StorageEndpoint, CommandEndpoint) {
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        (StorageEndpoint::new(addr), CommandEndpoint::new(addr))
    }

    #[test]
    fn threshold_fires_on_multiples_of_twenty() {
        assert!(!crosses_threshold(0));
        assert!(!crosses_threshold(19));
        assert!(crosses_threshold(20));
        assert!(!crosses_threshold(21));
        assert!(crosses_threshold(40));
    }

    #[test]
    fn no_candidate_when_no_storages_registered() {
        let tree = TreeIndex::new();
        let p = common::Path::parse("/a").unwrap();
        assert!(choose_replication_target(&tree, &p).is_none());
    }

    #[test]
    fn picks_a_server_not_already_holding_the_path() {
        let mut tree = TreeIndex::new();
        let (s1, c1) = ep(9000);
        let (s2, c2) = ep(9001);
        tree.admit(s1, c1);
        tree.admit(s2, c2);
        let p = common::Path::parse("/a").unwrap();
        tree.insert_new(&p, s1, c1);

        let chosen = choose_replication_target(&tree, &p).unwrap();
        assert_eq!(chosen, (s2, c2));
    }

    #[test]
    fn no_candidate_once_every_server_holds_it() {
        let mut tree = TreeIndex::new();
        let (s1, c1) = ep(9000);
        tree.admit(s1, c1);
        let p = common::Path::parse("/a").unwrap();
        tree.insert_new(&p, s1, c1);

        assert!(choose_replication_target(&tree, &p).is_none());
    }
}
