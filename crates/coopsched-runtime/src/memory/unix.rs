//! Unix stack mapping using mmap

use core::ptr::NonNull;

use coopsched_core::constants::GUARD_SIZE;
use coopsched_core::error::MemoryError;
use coopsched_core::kwarn;
use nix::errno::Errno;

use super::Stack;

/// System page size, falling back to the guard size if sysconf fails
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
        GUARD_SIZE
    } else {
        size as usize
    }
}

impl Stack {
    /// Map a stack with at least `size` usable bytes
    ///
    /// The usable part is rounded up to whole pages. The guard page below
    /// it stays PROT_NONE so a run past the fencepost faults.
    pub fn allocate(size: usize) -> Result<Stack, MemoryError> {
        let page = page_size();
        if size == 0 {
            return Err(MemoryError::InvalidSize);
        }
        let usable = size
            .checked_add(page - 1)
            .map(|s| s & !(page - 1))
            .ok_or(MemoryError::InvalidSize)?;
        let mapped = usable.checked_add(page).ok_or(MemoryError::InvalidSize)?;

        let base = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                mapped,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if base == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed(Errno::last() as i32));
        }

        let ret = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
        if ret != 0 {
            let errno = Errno::last() as i32;
            unsafe { libc::munmap(base, mapped) };
            return Err(MemoryError::ProtectionFailed(errno));
        }

        let base = NonNull::new(base as *mut u8).ok_or(MemoryError::AllocationFailed(0))?;
        let stack = Stack { base, mapped, guard: page };
        stack.write_fencepost();
        Ok(stack)
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        let ret = unsafe { libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.mapped) };
        if ret != 0 {
            kwarn!("munmap of stack at {:p} failed: {}", self.base, Errno::last());
        }
    }
}
