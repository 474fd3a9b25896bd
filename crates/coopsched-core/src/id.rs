//! Logical thread identifier type

use core::fmt;

/// Identifier of a logical thread
///
/// A slot index into the thread table plus the generation of that slot.
/// Slots of reclaimed threads are handed out again under a new generation,
/// so an id held past its thread's lifetime never names the next occupant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ThreadId {
    index: u32,
    generation: u32,
}

impl ThreadId {
    /// Create a first-generation ThreadId for slot `index`
    #[inline]
    pub const fn new(index: u32) -> Self {
        Self::with_generation(index, 0)
    }

    #[inline]
    pub const fn with_generation(index: u32, generation: u32) -> Self {
        ThreadId { index, generation }
    }

    /// Get the raw slot index
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.index
    }

    /// Get the slot index as usize for indexing
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl From<u32> for ThreadId {
    #[inline]
    fn from(index: u32) -> Self {
        ThreadId::new(index)
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ThreadId({})", self)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generation == 0 {
            write!(f, "{}", self.index)
        } else {
            write!(f, "{}.{}", self.index, self.generation)
        }
    }
}
