use std::collections::VecDeque;

use common::Path;

/// Identity of a request sitting in the lock manager's FIFO wait queue.
pub type RequestId = u64;

/// A waiting lock request: a `(path, exclusive)` pair assigned a unique
/// identity, queued from enqueue until either abandonment (on
/// file-not-found) or unlock.
#[derive(Debug, Clone)]
pub struct LockRequest {
    pub id: RequestId,
    pub path: Path,
    pub exclusive: bool,
}

/// True iff `earlier` (enqueued first) conflicts with `later`, i.e.
/// `later` must wait for `earlier` to unlock. See the conflict table:
///
/// | earlier | later | conflict iff |
/// |---|---|---|
/// | write q | read p  | q == p or isSubpath(p, q) |
/// | read q  | write p | q == p or isSubpath(q, p) |
/// | write q | write p | q == p, or isSubpath(p, q), or isSubpath(q, p) |
/// | read q  | read p  | never |
pub fn conflicts(earlier: &LockRequest, later: &LockRequest) -> bool {
    let q = &earlier.path;
    let p = &later.path;
    match (earlier.exclusive, later.exclusive) {
        (false, false) => false,
        (true, false) => q == p || q.is_subpath(p),
        (false, true) => q == p || p.is_subpath(q),
        (true, true) => q == p || p.is_subpath(q) || q.is_subpath(p),
    }
}

/// The result of attempting to admit a queued request.
pub enum Admission {
    /// No earlier conflicting request remains; the caller may proceed.
    Granted,
    /// An earlier request still conflicts; the caller must keep waiting.
    Blocked,
    /// The target path vanished while waiting; the request has been
    /// dequeued and the caller should surface `NotFound`.
    Abandoned,
}

/// The global FIFO queue of pending lock requests. Holds no knowledge of
/// the tree index itself — callers supply a `contains` predicate so the
/// queue and the index can live under the same outer mutex without this
/// type borrowing it directly.
#[derive(Debug, Default)]
pub struct LockQueue {
    queue: VecDeque<LockRequest>,
    next_id: RequestId,
}

impl LockQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `(path, exclusive)` at the tail and return its identity.
    pub fn enqueue(&mut self, path: Path, exclusive: bool) -> RequestId {
        let id = self.next_id;
        self.next_id += 1;
        self.queue.push_back(LockRequest {
            id,
            path,
            exclusive,
        });
        id
    }

    /// Attempt to admit the request with identity `id`. `contains` tells
    /// whether the request's path is still present in the tree index
    /// (root is always present and is never checked).
    pub fn try_admit(&mut self, id: RequestId, contains: impl Fn(&Path) -> bool) -> Admission {
        let pos = self
            .queue
            .iter()
            .position(|r| r.id == id)
            .expect("try_admit called for a request not in the queue");

        let path_is_root = self.queue[pos].path.is_root();
        if !path_is_root && !contains(&self.queue[pos].path) {
            self.queue.remove(pos);
            return Admission::Abandoned;
        }

        let later = self.queue[pos].clone();
        let blocked = self.queue[..pos].iter().any(|earlier| conflicts(earlier, &later));

        if blocked {
            Admission::Blocked
        } else {
            Admission::Granted
        }
    }

    /// Remove the first queued entry whose `(path, exclusive)` matches.
    /// Returns `true` if one was found and removed.
    pub fn release(&mut self, path: &Path, exclusive: bool) -> bool {
        if let Some(pos) = self
            .queue
            .iter()
            .position(|r| &r.path == path && r.exclusive == exclusive)
        {
            self.queue.remove(pos);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn req(id: RequestId, path: &str, exclusive: bool) -> LockRequest {
        LockRequest {
            id,
            path: p(path),
            exclusive,
        }
    }

    #[test]
    fn two_reads_never_conflict() {
        let a = req(0, "/a", false);
        let b = req(1, "/a", false);
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn writer_above_reader_conflicts() {
        let writer = req(0, "/a", true);
        let reader = req(1, "/a/b/c", false);
        assert!(conflicts(&writer, &reader));
    }

    #[test]
    fn writer_below_reader_does_not_conflict() {
        let writer = req(0, "/a/b/c", true);
        let reader = req(1, "/a", false);
        assert!(!conflicts(&writer, &reader));
    }

    #[test]
    fn reader_then_writer_at_or_above_conflicts() {
        let reader = req(0, "/a/b", false);
        let writer = req(1, "/a", true);
        assert!(conflicts(&reader, &writer));
    }

    #[test]
    fn reader_then_writer_strictly_below_does_not_conflict() {
        let reader = req(0, "/a", false);
        let writer = req(1, "/a/b", true);
        assert!(!conflicts(&reader, &writer));
    }

    #[test]
    fn nested_writers_always_conflict() {
        let w1 = req(0, "/a", true);
        let w2 = req(1, "/a/b", true);
        assert!(conflicts(&w1, &w2));
        let w3 = req(0, "/a/b", true);
        let w4 = req(1, "/a", true);
        assert!(conflicts(&w3, &w4));
    }

    #[test]
    fn fifo_admission_s4_hierarchical_locking() {
        let mut q = LockQueue::new();
        let t1 = q.enqueue(p("/a"), true);
        assert!(matches!(q.try_admit(t1, |_| true), Admission::Granted));

        let t2 = q.enqueue(p("/a/b/c"), false);
        assert!(matches!(q.try_admit(t2, |_| true), Admission::Blocked));

        assert!(q.release(&p("/a"), true));
        assert!(matches!(q.try_admit(t2, |_| true), Admission::Granted));
    }

    #[test]
    fn fifo_admission_s5_fairness() {
        let mut q = LockQueue::new();
        let t1 = q.enqueue(Path::root(), false);
        let t2 = q.enqueue(Path::root(), true);
        let t3 = q.enqueue(Path::root(), false);

        assert!(matches!(q.try_admit(t1, |_| true), Admission::Granted));
        assert!(matches!(q.try_admit(t2, |_| true), Admission::Blocked));
        assert!(matches!(q.try_admit(t3, |_| true), Admission::Blocked));

        assert!(q.release(&Path::root(), false));
        assert!(matches!(q.try_admit(t2, |_| true), Admission::Granted));
        assert!(matches!(q.try_admit(t3, |_| true), Admission::Blocked));

        assert!(q.release(&Path::root(), true));
        assert!(matches!(q.try_admit(t3, |_| true), Admission::Granted));
    }

    #[test]
    fn not_found_abandons_the_request() {
        let mut q = LockQueue::new();
        let id = q.enqueue(p("/gone"), false);
        assert!(matches!(q.try_admit(id, |_| false), Admission::Abandoned));
        // the entry was dequeued; releasing it again finds nothing
        assert!(!q.release(&p("/gone"), false));
    }

    #[test]
    fn unlock_of_unheld_request_is_reported_to_caller() {
        let mut q = LockQueue::new();
        assert!(!q.release(&p("/never-locked"), false));
    }
}
