//! Thread-local processor slot
//!
//! At most one processor per OS thread. The slot holds a raw pointer so
//! that a thread's start routine, running on a freshly mapped stack, can
//! reach the same processor as the code that spawned it.

use std::cell::Cell;
use std::ptr;

use crate::scheduler::Processor;

thread_local! {
    static PROCESSOR: Cell<*mut Processor> = const { Cell::new(ptr::null_mut()) };
}

/// Install `processor` on this OS thread; hands it back if one is already installed
pub(crate) fn install(processor: Box<Processor>) -> Result<(), Box<Processor>> {
    if is_installed() {
        return Err(processor);
    }
    PROCESSOR.with(|cell| cell.set(Box::into_raw(processor)));
    Ok(())
}

/// Remove and return this OS thread's processor
pub(crate) fn uninstall() -> Option<Box<Processor>> {
    let ptr = PROCESSOR.with(|cell| cell.replace(ptr::null_mut()));
    if ptr.is_null() {
        None
    } else {
        // SAFETY: the pointer came from Box::into_raw in `install`
        Some(unsafe { Box::from_raw(ptr) })
    }
}

#[inline]
pub(crate) fn processor_ptr() -> *mut Processor {
    PROCESSOR.with(|cell| cell.get())
}

/// Check if a processor is installed on this OS thread
#[inline]
pub fn is_installed() -> bool {
    !processor_ptr().is_null()
}
