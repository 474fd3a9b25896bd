//! Thread stacks
//!
//! Each spawned thread gets its own mapping: one inaccessible guard page
//! at the low end, then the usable stack growing down from the top. The
//! lowest usable word holds a fencepost that is checked every time the
//! thread is switched away from.
//!
//! ```text
//!   base                bottom                              top
//!   ├──── guard ────────┼─ fencepost ─┬─────── stack ◄──────┤
//!   │    PROT_NONE      │   8 bytes   │   grows downward    │
//! ```

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::page_size;
    } else {
        compile_error!("coopsched-runtime requires a unix target");
    }
}

use core::ptr::NonNull;

use coopsched_core::constants::STACK_FENCEPOST;

/// One mapped thread stack; unmapped on drop
pub struct Stack {
    /// Start of the mapping (the guard page)
    base: NonNull<u8>,
    /// Total mapped bytes including the guard
    mapped: usize,
    /// Guard bytes at `base`
    guard: usize,
}

impl Stack {
    /// Highest address of the stack (exclusive); initial stack pointer
    #[inline]
    pub fn top(&self) -> *mut u8 {
        // SAFETY: `mapped` is the length of the mapping at `base`
        unsafe { self.base.as_ptr().add(self.mapped) }
    }

    /// Lowest usable address, where the fencepost lives
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: the guard lies inside the mapping
        unsafe { self.base.as_ptr().add(self.guard) }
    }

    /// Usable bytes between the guard and the top
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.mapped - self.guard
    }

    /// Whether the lowest usable word still holds the fencepost
    #[inline]
    pub fn fencepost_intact(&self) -> bool {
        // SAFETY: `bottom` is mapped read/write and 8-byte aligned (page aligned)
        unsafe { core::ptr::read_volatile(self.bottom() as *const u64) == STACK_FENCEPOST }
    }

    fn write_fencepost(&self) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile(self.bottom() as *mut u64, STACK_FENCEPOST) }
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("usable", &self.usable_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopsched_core::MemoryError;

    #[test]
    fn test_allocate_rounds_to_pages() {
        let stack = Stack::allocate(20_000).unwrap();
        assert!(stack.usable_size() >= 20_000);
        assert_eq!(stack.usable_size() % page_size(), 0);
        assert_eq!(stack.top() as usize % 16, 0);
        assert_eq!(stack.top() as usize - stack.bottom() as usize, stack.usable_size());
    }

    #[test]
    fn test_fresh_stack_has_fencepost() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        assert!(stack.fencepost_intact());

        // Writes near the top do not disturb it
        unsafe { stack.top().sub(64).write_bytes(0xAB, 64) };
        assert!(stack.fencepost_intact());
    }

    #[test]
    fn test_overwritten_fencepost_detected() {
        let stack = Stack::allocate(64 * 1024).unwrap();
        unsafe { stack.bottom().write_bytes(0, 8) };
        assert!(!stack.fencepost_intact());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(Stack::allocate(0).err(), Some(MemoryError::InvalidSize));
        assert_eq!(Stack::allocate(usize::MAX).err(), Some(MemoryError::InvalidSize));
    }
}
