use std::collections::{HashMap, HashSet};

use common::{CommandEndpoint, DfsError, DfsResult, Path, StorageEndpoint};

/// The naming server's in-memory directory tree: a mapping from path to
/// the storage/command replicas that hold it, plus the bookkeeping needed
/// to disambiguate files from directories and to reject double
/// registration.
///
/// Entries are created by [`TreeIndex::register_file`] (bulk, via the
/// registration reconciler) and [`TreeIndex::create_file`]/
/// [`TreeIndex::create_directory`] (single). They are removed by
/// [`TreeIndex::remove`]. Replication only appends to existing keys via
/// [`TreeIndex::add_replica`]; it never creates or removes keys.
#[derive(Debug, Default)]
pub struct TreeIndex {
    storage_map: HashMap<Path, Vec<StorageEndpoint>>,
    command_map: HashMap<Path, Vec<CommandEndpoint>>,
    created_dirs: HashSet<Path>,
    known_storages: HashSet<StorageEndpoint>,
    known_commands: HashSet<CommandEndpoint>,
    known_servers: Vec<(StorageEndpoint, CommandEndpoint)>,
    access_count: HashMap<Path, u64>,
}

impl TreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff `p` is root, a key of `storage_map`, an ancestor of one,
    /// or an explicitly created directory (invariant 1).
    pub fn contains(&self, p: &Path) -> bool {
        p.is_root()
            || self.created_dirs.contains(p)
            || self.storage_map.keys().any(|k| p.is_subpath(k))
    }

    /// Root, an explicit directory, or a strict ancestor of a file key is
    /// a directory; a file key with no strict descendant key is a file.
    pub fn is_directory(&self, p: &Path) -> DfsResult<bool> {
        if !self.contains(p) {
            return Err(DfsError::NotFound(p.to_wire_string()));
        }
        if p.is_root() || self.created_dirs.contains(p) {
            return Ok(true);
        }
        Ok(self.storage_map.keys().any(|k| p.is_strict_subpath(k)))
    }

    /// Direct child names under `dir`. Requires `dir` to be a directory.
    pub fn list(&self, dir: &Path) -> DfsResult<Vec<String>> {
        if !self.is_directory(dir)? {
            return Err(DfsError::NotFound(dir.to_wire_string()));
        }
        let mut names: HashSet<String> = HashSet::new();
        for k in self.storage_map.keys() {
            if k != dir && dir.is_subpath(k) {
                if let Some(name) = k.direct_child_name(dir) {
                    names.insert(name.to_string());
                }
            }
        }
        let mut out: Vec<String> = names.into_iter().collect();
        out.sort();
        Ok(out)
    }

    pub fn add_replica(&mut self, p: &Path, storage: StorageEndpoint, command: CommandEndpoint) {
        self.storage_map.entry(p.clone()).or_default().push(storage);
        self.command_map.entry(p.clone()).or_default().push(command);
    }

    /// Record a freshly created file or directory's storage/command
    /// endpoint, without going through [`TreeIndex::add_replica`]'s
    /// append semantics for an existing key (the keys are guaranteed
    /// absent by the caller's precondition check).
    pub fn insert_new(&mut self, p: &Path, storage: StorageEndpoint, command: CommandEndpoint) {
        self.storage_map.insert(p.clone(), vec![storage]);
        self.command_map.insert(p.clone(), vec![command]);
    }

    pub fn mark_created_directory(&mut self, p: &Path) {
        self.created_dirs.insert(p.clone());
    }

    /// Remove `p` from all maps and, if it is a directory, every strict
    /// descendant key as well.
    pub fn remove(&mut self, p: &Path) {
        let descendants: Vec<Path> = self
            .storage_map
            .keys()
            .filter(|k| p.is_subpath(k))
            .cloned()
            .collect();
        for k in &descendants {
            self.storage_map.remove(k);
            self.command_map.remove(k);
            self.created_dirs.remove(k);
            self.access_count.remove(k);
        }
        self.created_dirs.remove(p);
        self.access_count.remove(p);
    }

    pub fn default_storage(&self, p: &Path) -> Option<StorageEndpoint> {
        self.storage_map.get(p).and_then(|v| v.first()).copied()
    }

    pub fn default_command(&self, p: &Path) -> Option<CommandEndpoint> {
        self.command_map.get(p).and_then(|v| v.first()).copied()
    }

    pub fn replicas(&self, p: &Path) -> &[StorageEndpoint] {
        self.storage_map.get(p).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First-listed storage endpoint at the nearest ancestor key of `p`
    /// (including `p` itself). Used when an operation targets a path
    /// that has no direct entry of its own, e.g. a freshly created
    /// directory borrowing its parent's endpoint. Falls back to an
    /// arbitrary registered server when `p` has no explicit ancestor
    /// entry at all — always the case for root, and for any inferred
    /// directory whose only descendants live elsewhere in the tree.
    pub fn ancestor_storage(&self, p: &Path) -> Option<StorageEndpoint> {
        self.nearest_ancestor_key(p)
            .and_then(|k| self.default_storage(&k))
            .or_else(|| self.known_servers.first().map(|(s, _)| *s))
    }

    pub fn ancestor_command(&self, p: &Path) -> Option<CommandEndpoint> {
        self.nearest_ancestor_key(p)
            .and_then(|k| self.default_command(&k))
            .or_else(|| self.known_servers.first().map(|(_, c)| *c))
    }

    fn nearest_ancestor_key(&self, p: &Path) -> Option<Path> {
        self.storage_map
            .keys()
            .filter(|k| k.is_subpath(p))
            .max_by_key(|k| k.depth())
            .cloned()
    }

    pub fn is_known_storage(&self, endpoint: &StorageEndpoint) -> bool {
        self.known_storages.contains(endpoint)
    }

    pub fn is_known_command(&self, endpoint: &CommandEndpoint) -> bool {
        self.known_commands.contains(endpoint)
    }

    pub fn admit(&mut self, storage: StorageEndpoint, command: CommandEndpoint) {
        self.known_storages.insert(storage);
        self.known_commands.insert(command);
        self.known_servers.push((storage, command));
    }

    pub fn has_any_storage(&self) -> bool {
        !self.known_storages.is_empty()
    }

    /// Every registered `(storage, command)` pair, in registration order.
    pub fn known_servers(&self) -> &[(StorageEndpoint, CommandEndpoint)] {
        &self.known_servers
    }

    /// Increment `accessCount[p]` and return the new value.
    pub fn record_access(&mut self, p: &Path) -> u64 {
        let count = self.access_count.entry(p.clone()).or_insert(0);
        *count += 1;
        *count
    }
}
