//! Collaborator traits
//!
//! The dispatch core is platform agnostic. Everything it needs from the
//! host (the thread control block, a tick source, per-thread address
//! space state, the stack switch itself) comes in through these traits.

use core::ptr::NonNull;

use crate::state::{Priority, ThreadStatus};
use crate::stats::ThreadAccounting;

/// Monotonic tick source
pub trait Clock {
    /// Current tick count; never decreases
    fn now(&self) -> u64;
}

/// Per-thread machine-level execution context
///
/// Saved when the owning thread is switched away from, restored when it
/// resumes. Save order is registers then context; restore mirrors it.
pub trait AddressSpace {
    /// Save the user-mode register snapshot
    fn save_registers(&mut self);

    /// Save space-specific state (page tables, TLB tags, ...)
    fn save_context(&mut self);

    /// Restore the user-mode register snapshot
    fn restore_registers(&mut self);

    /// Restore space-specific state
    fn restore_context(&mut self);
}

/// Thread control block as seen by the dispatcher
pub trait Schedulable {
    /// Name for diagnostics
    fn name(&self) -> &str;

    /// Immutable scheduling priority
    fn priority(&self) -> Priority;

    fn status(&self) -> ThreadStatus;

    fn set_status(&mut self, status: ThreadStatus);

    /// Wait/burst snapshots and totals
    fn accounting(&self) -> &ThreadAccounting;

    fn accounting_mut(&mut self) -> &mut ThreadAccounting;

    /// Address space to save/restore around switches; `None` for kernel-only threads
    fn address_space(&mut self) -> Option<&mut (dyn AddressSpace + 'static)> {
        None
    }

    /// True if the thread has written past the end of its stack
    fn stack_overflowed(&self) -> bool {
        false
    }
}

/// The stack/register switch
///
/// Suspends the logical thread that calls it and resumes `to` at its last
/// suspension point (or at its entry trampoline if it never ran). The call
/// returns only when some later transfer names `from` as its target.
pub trait ContextTransfer<T> {
    /// # Safety
    ///
    /// `from` must be the thread whose stack is executing this call, `to`
    /// must hold a context that was saved by a previous transfer or built
    /// for a fresh start. Both must stay alive until they are resumed or
    /// retired.
    unsafe fn transfer(&mut self, from: NonNull<T>, to: NonNull<T>);
}
