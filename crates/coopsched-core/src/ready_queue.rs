//! Ready queue
//!
//! Stable priority queue of runnable threads. Ordering key is
//! (priority ascending, insertion sequence ascending): the most urgent
//! priority runs first, and threads of equal priority run FIFO.
//!
//! No locking. Callers already hold exclusive access to the dispatcher.

use std::collections::{BTreeMap, HashSet};

use crate::id::ThreadId;
use crate::state::Priority;

/// One queued thread, as reported by [`ReadyQueue::snapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyEntry {
    pub id: ThreadId,
    pub priority: Priority,
}

pub struct ReadyQueue {
    entries: BTreeMap<(Priority, u64), ThreadId>,
    members: HashSet<ThreadId>,
    /// Insertion counter; ties on priority break on this
    next_seq: u64,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            members: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Insert behind every queued thread of the same or more urgent priority
    ///
    /// # Panics
    ///
    /// If `id` is already queued.
    pub fn insert(&mut self, id: ThreadId, priority: Priority) {
        assert!(self.members.insert(id), "thread {} is already in the ready queue", id);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert((priority, seq), id);
    }

    /// Remove and return the head, or `None` if empty
    pub fn remove_next(&mut self) -> Option<ReadyEntry> {
        let ((priority, _), id) = self.entries.pop_first()?;
        self.members.remove(&id);
        Some(ReadyEntry { id, priority })
    }

    /// Head of the queue without removing it
    pub fn peek(&self) -> Option<ReadyEntry> {
        self.entries
            .first_key_value()
            .map(|(&(priority, _), &id)| ReadyEntry { id, priority })
    }

    /// Queue contents in dispatch order
    pub fn snapshot(&self) -> Vec<ReadyEntry> {
        self.entries
            .iter()
            .map(|(&(priority, _), &id)| ReadyEntry { id, priority })
            .collect()
    }

    #[inline]
    pub fn contains(&self, id: ThreadId) -> bool {
        self.members.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
