//! Deadline-ordered ready queue and the bounded set of in-flight actions.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Entry {
    ready_at: Instant,
    seq: u64,
    path: PathBuf,
}

/// Paths waiting to be looked at by the executor, earliest deadline first.
///
/// A path is queued at most once. Entries with equal deadlines come out in
/// insertion order. Removal is lazy: superseded heap entries are skipped
/// when they reach the top.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    queued: HashMap<PathBuf, u64>,
    next_seq: u64,
}

impl ReadyQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `path` for `ready_at`. Returns `false` if already queued.
    pub fn push(&mut self, path: &Path, ready_at: Instant) -> bool {
        if self.queued.contains_key(path) {
            return false;
        }
        self.schedule(path, ready_at);
        true
    }

    /// Queue `path` for `ready_at`, replacing any existing deadline.
    pub fn requeue(&mut self, path: &Path, ready_at: Instant) {
        self.schedule(path, ready_at);
    }

    /// Drop `path` from the queue.
    pub fn remove(&mut self, path: &Path) -> bool {
        self.queued.remove(path).is_some()
    }

    /// Check whether `path` is queued.
    pub fn contains(&self, path: &Path) -> bool {
        self.queued.contains_key(path)
    }

    /// Number of queued paths.
    pub fn len(&self) -> usize {
        self.queued.len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }

    /// Earliest deadline among queued paths.
    pub fn next_ready_at(&mut self) -> Option<Instant> {
        self.discard_stale();
        self.heap.peek().map(|Reverse(entry)| entry.ready_at)
    }

    /// Pop the earliest path whose deadline is at or before `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<PathBuf> {
        self.discard_stale();
        let due = matches!(self.heap.peek(), Some(Reverse(entry)) if entry.ready_at <= now);
        if !due {
            return None;
        }
        let Reverse(entry) = self.heap.pop()?;
        self.queued.remove(&entry.path);
        Some(entry.path)
    }

    fn schedule(&mut self, path: &Path, ready_at: Instant) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queued.insert(path.to_path_buf(), seq);
        self.heap.push(Reverse(Entry {
            ready_at,
            seq,
            path: path.to_path_buf(),
        }));
    }

    fn discard_stale(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.queued.get(&top.path) == Some(&top.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

/// Bounded set of paths with an operation in flight.
#[derive(Debug)]
pub struct ExecutionSlots {
    bound: usize,
    in_flight: HashSet<PathBuf>,
}

impl ExecutionSlots {
    /// Create a slot set holding at most `bound` paths.
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            in_flight: HashSet::new(),
        }
    }

    /// Whether another path can be reserved.
    pub fn has_free(&self) -> bool {
        self.in_flight.len() < self.bound
    }

    /// Reserve a slot for `path`. Returns `false` if full or already held.
    pub fn reserve(&mut self, path: &Path) -> bool {
        if !self.has_free() || self.in_flight.contains(path) {
            return false;
        }
        self.in_flight.insert(path.to_path_buf())
    }

    /// Release the slot held by `path`.
    pub fn release(&mut self, path: &Path) -> bool {
        self.in_flight.remove(path)
    }

    /// Check if `path` holds a slot.
    pub fn contains(&self, path: &Path) -> bool {
        self.in_flight.contains(path)
    }

    /// Number of reserved slots.
    pub fn len(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if no slot is reserved.
    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Maximum number of slots.
    pub fn bound(&self) -> usize {
        self.bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn pops_in_deadline_order() {
        let base = Instant::now();
        let mut queue = ReadyQueue::new();
        queue.push(Path::new("/late"), at(base, 300));
        queue.push(Path::new("/early"), at(base, 100));

        assert_eq!(queue.next_ready_at(), Some(at(base, 100)));
        assert_eq!(queue.pop_due(at(base, 50)), None);
        assert_eq!(queue.pop_due(at(base, 1000)), Some("/early".into()));
        assert_eq!(queue.pop_due(at(base, 1000)), Some("/late".into()));
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_deadlines_are_fifo() {
        let base = Instant::now();
        let mut queue = ReadyQueue::new();
        queue.push(Path::new("/z"), base);
        queue.push(Path::new("/a"), base);

        assert_eq!(queue.pop_due(base), Some("/z".into()));
        assert_eq!(queue.pop_due(base), Some("/a".into()));
    }

    #[test]
    fn path_queued_once() {
        let base = Instant::now();
        let mut queue = ReadyQueue::new();
        assert!(queue.push(Path::new("/a"), at(base, 10)));
        assert!(!queue.push(Path::new("/a"), at(base, 5)));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_ready_at(), Some(at(base, 10)));
    }

    #[test]
    fn requeue_replaces_deadline() {
        let base = Instant::now();
        let mut queue = ReadyQueue::new();
        queue.push(Path::new("/a"), at(base, 10));
        queue.requeue(Path::new("/a"), at(base, 500));

        assert_eq!(queue.pop_due(at(base, 100)), None);
        assert_eq!(queue.next_ready_at(), Some(at(base, 500)));
        assert_eq!(queue.pop_due(at(base, 500)), Some("/a".into()));
        assert_eq!(queue.pop_due(at(base, 900)), None);
    }

    #[test]
    fn removed_entries_are_skipped() {
        let base = Instant::now();
        let mut queue = ReadyQueue::new();
        queue.push(Path::new("/a"), base);
        queue.push(Path::new("/b"), at(base, 1));
        assert!(queue.remove(Path::new("/a")));

        assert!(!queue.contains(Path::new("/a")));
        assert_eq!(queue.pop_due(at(base, 10)), Some("/b".into()));
        assert_eq!(queue.next_ready_at(), None);
    }

    #[test]
    fn slots_are_bounded() {
        let mut slots = ExecutionSlots::new(2);
        assert!(slots.reserve(Path::new("/a")));
        assert!(!slots.reserve(Path::new("/a")));
        assert!(slots.reserve(Path::new("/b")));
        assert!(!slots.has_free());
        assert!(!slots.reserve(Path::new("/c")));

        assert!(slots.release(Path::new("/a")));
        assert!(slots.reserve(Path::new("/c")));
        assert_eq!(slots.len(), 2);
    }
}
