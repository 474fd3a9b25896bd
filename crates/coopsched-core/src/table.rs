//! Thread table
//!
//! Owns every live thread control block. Each block is boxed so its address
//! stays fixed while the table grows; saved register areas inside a block
//! are handed to the stack switch by pointer. Freed slots are reused LIFO
//! under a bumped generation; lookups with an older generation miss.

use core::ptr::NonNull;

use crate::id::ThreadId;

struct Slot<T> {
    generation: u32,
    thread: Option<Box<T>>,
}

pub struct ThreadTable<T> {
    slots: Vec<Slot<T>>,
    /// LIFO stack of vacant slot indices
    free: Vec<u32>,
    live: usize,
}

impl<T> ThreadTable<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a thread, returning its id
    ///
    /// Prefers the most recently vacated slot.
    pub fn insert(&mut self, thread: T) -> ThreadId {
        let boxed = Box::new(thread);
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.thread = Some(boxed);
            return ThreadId::with_generation(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot { generation: 0, thread: Some(boxed) });
        ThreadId::new(index)
    }

    /// Take a thread out of the table; its slot becomes reusable
    pub fn remove(&mut self, id: ThreadId) -> Option<Box<T>> {
        let slot = self.slot_mut(id)?;
        let thread = slot.thread.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.as_u32());
        self.live -= 1;
        Some(thread)
    }

    #[inline]
    pub fn get(&self, id: ThreadId) -> Option<&T> {
        self.slots
            .get(id.as_usize())
            .filter(|slot| slot.generation == id.generation())?
            .thread
            .as_deref()
    }

    #[inline]
    pub fn get_mut(&mut self, id: ThreadId) -> Option<&mut T> {
        self.slot_mut(id)?.thread.as_deref_mut()
    }

    #[inline]
    fn slot_mut(&mut self, id: ThreadId) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(id.as_usize())
            .filter(|slot| slot.generation == id.generation())
    }

    /// Stable pointer to a live thread's control block
    #[inline]
    pub fn as_ptr(&mut self, id: ThreadId) -> Option<NonNull<T>> {
        self.get_mut(id).map(NonNull::from)
    }

    #[inline]
    pub fn contains(&self, id: ThreadId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live threads
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Live threads in id order
    pub fn iter(&self) -> impl Iterator<Item = (ThreadId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let id = ThreadId::with_generation(i as u32, slot.generation);
                slot.thread.as_deref().map(|t| (id, t))
            })
    }
}

impl<T> Default for ThreadTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_remove() {
        let mut table = ThreadTable::new();
        let a = table.insert("a");
        let b = table.insert("b");
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(a), Some(&"a"));

        assert_eq!(table.remove(a).map(|t| *t), Some("a"));
        assert!(!table.contains(a));
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);
        assert!(table.contains(b));
    }

    #[test]
    fn test_lifo_id_reuse() {
        let mut table = ThreadTable::new();
        let a = table.insert(1);
        let b = table.insert(2);
        let _c = table.insert(3);
        table.remove(a);
        table.remove(b);

        let d = table.insert(4);
        let e = table.insert(5);
        assert_eq!(d.as_usize(), b.as_usize());
        assert_eq!(e.as_usize(), a.as_usize());
        assert_eq!(d.generation(), 1);
        assert_eq!(table.insert(6), ThreadId::new(3));
    }

    #[test]
    fn test_stale_id_misses_reused_slot() {
        let mut table = ThreadTable::new();
        let old = table.insert("old");
        table.remove(old);
        let new = table.insert("new");
        assert_eq!(new.as_usize(), old.as_usize());

        assert_ne!(new, old);
        assert!(table.get(old).is_none());
        assert!(table.get_mut(old).is_none());
        assert!(table.remove(old).is_none());
        assert_eq!(table.get(new), Some(&"new"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_pointer_stable_across_growth() {
        let mut table = ThreadTable::new();
        let first = table.insert(0u64);
        let before = table.as_ptr(first).unwrap();
        for i in 1..1000u64 {
            table.insert(i);
        }
        assert_eq!(table.as_ptr(first).unwrap(), before);
    }

    #[test]
    fn test_iter_skips_vacant() {
        let mut table = ThreadTable::new();
        let a = table.insert('a');
        let b = table.insert('b');
        table.remove(a);
        let ids: Vec<_> = table.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![b]);
    }
}
