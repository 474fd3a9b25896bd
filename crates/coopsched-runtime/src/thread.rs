//! Green thread control block

use core::ptr::{addr_of, addr_of_mut, NonNull};

use coopsched_core::error::SchedResult;
use coopsched_core::{
    AddressSpace, ContextTransfer, Priority, Schedulable, ThreadAccounting, ThreadStatus,
};

use crate::arch::{self, SavedRegs};
use crate::memory::Stack;

pub(crate) type Entry = Box<dyn FnOnce() + 'static>;

/// One green thread
///
/// The bootstrap thread runs on the OS thread's own stack and has no
/// `Stack`; every spawned thread owns its mapping, which is released when
/// the dispatch core drops the thread.
pub struct GreenThread {
    name: String,
    priority: Priority,
    status: ThreadStatus,
    accounting: ThreadAccounting,
    context: SavedRegs,
    stack: Option<Stack>,
    entry: Option<Entry>,
    space: Option<Box<dyn AddressSpace>>,
    /// Unpark arrived while the thread was not blocked
    unpark_token: bool,
}

impl GreenThread {
    /// Control block for the thread already executing on this OS thread
    pub(crate) fn bootstrap(name: impl Into<String>, priority: Priority) -> Self {
        Self {
            name: name.into(),
            priority,
            status: ThreadStatus::New,
            accounting: ThreadAccounting::default(),
            context: SavedRegs::default(),
            stack: None,
            entry: None,
            space: None,
            unpark_token: false,
        }
    }

    /// Control block whose first dispatch enters `start(arg)` on `stack`
    pub(crate) fn spawned(
        name: String,
        priority: Priority,
        stack: Stack,
        entry: Entry,
        space: Option<Box<dyn AddressSpace>>,
        start: arch::EntryFn,
        arg: usize,
    ) -> Self {
        let mut context = SavedRegs::default();
        // SAFETY: `stack.top()` bounds a live read/write mapping owned by
        // this control block
        unsafe { arch::init_context(&mut context, stack.top(), start, arg) };
        Self {
            name,
            priority,
            status: ThreadStatus::New,
            accounting: ThreadAccounting::default(),
            context,
            stack: Some(stack),
            entry: Some(entry),
            space,
            unpark_token: false,
        }
    }

    /// Closure to run; `None` after the first call
    pub(crate) fn take_entry(&mut self) -> Option<Entry> {
        self.entry.take()
    }

    pub(crate) fn set_unpark_token(&mut self) {
        self.unpark_token = true;
    }

    pub(crate) fn take_unpark_token(&mut self) -> bool {
        std::mem::take(&mut self.unpark_token)
    }

    pub fn stack(&self) -> Option<&Stack> {
        self.stack.as_ref()
    }
}

impl Schedulable for GreenThread {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> Priority {
        self.priority
    }

    fn status(&self) -> ThreadStatus {
        self.status
    }

    fn set_status(&mut self, status: ThreadStatus) {
        debug_assert!(
            self.status == status || self.status.can_transition_to(status),
            "thread \"{}\": {} -> {}",
            self.name,
            self.status,
            status
        );
        self.status = status;
    }

    fn accounting(&self) -> &ThreadAccounting {
        &self.accounting
    }

    fn accounting_mut(&mut self) -> &mut ThreadAccounting {
        &mut self.accounting
    }

    fn address_space(&mut self) -> Option<&mut (dyn AddressSpace + 'static)> {
        self.space.as_deref_mut()
    }

    fn stack_overflowed(&self) -> bool {
        self.stack.as_ref().is_some_and(|s| !s.fencepost_intact())
    }
}

impl std::fmt::Debug for GreenThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreenThread")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("status", &self.status)
            .field("stack", &self.stack)
            .finish()
    }
}

/// Register-level switch between two green threads
#[derive(Debug, Default, Clone, Copy)]
pub struct ArchTransfer;

impl ContextTransfer<GreenThread> for ArchTransfer {
    unsafe fn transfer(&mut self, from: NonNull<GreenThread>, to: NonNull<GreenThread>) {
        // No references: `from` stays borrowed by its own suspended frames
        let old = addr_of_mut!((*from.as_ptr()).context);
        let new = addr_of!((*to.as_ptr()).context);
        arch::switch_context(old, new);
    }
}

/// Thread factory, configuring the name, priority and address space of a
/// new green thread
///
/// ```rust,ignore
/// let id = Builder::new()
///     .name("producer")
///     .priority(Priority::new(3))
///     .spawn(|| produce())?;
/// ```
#[derive(Default)]
pub struct Builder {
    pub(crate) name: Option<String>,
    pub(crate) priority: Option<Priority>,
    pub(crate) stack_size: Option<usize>,
    pub(crate) space: Option<Box<dyn AddressSpace>>,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Lower values are more urgent
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// State saved and restored around every switch away from and back to the thread
    pub fn address_space(mut self, space: impl AddressSpace + 'static) -> Self {
        self.space = Some(Box::new(space));
        self
    }

    /// Create the thread and make it ready
    pub fn spawn<F>(self, f: F) -> SchedResult<coopsched_core::ThreadId>
    where
        F: FnOnce() + 'static,
    {
        crate::scheduler::spawn_thread(self, Box::new(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn never(_: usize) -> ! {
        unreachable!()
    }

    #[test]
    fn test_spawned_thread_checks_its_fencepost() {
        let stack = Stack::allocate(32 * 1024).unwrap();
        let bottom = stack.bottom();
        let thread = GreenThread::spawned(
            "t".into(),
            Priority::NORMAL,
            stack,
            Box::new(|| {}),
            None,
            never,
            0,
        );
        assert!(!thread.stack_overflowed());

        unsafe { bottom.write_bytes(0x55, 8) };
        assert!(thread.stack_overflowed());
    }

    #[test]
    fn test_bootstrap_has_no_stack_or_entry() {
        let mut thread = GreenThread::bootstrap("main", Priority::new(2));
        assert!(thread.stack().is_none());
        assert!(thread.take_entry().is_none());
        assert!(!thread.stack_overflowed());
        assert!(thread.address_space().is_none());
    }

    #[test]
    fn test_unpark_token_consumed_once() {
        let mut thread = GreenThread::bootstrap("main", Priority::NORMAL);
        assert!(!thread.take_unpark_token());
        thread.set_unpark_token();
        assert!(thread.take_unpark_token());
        assert!(!thread.take_unpark_token());
    }
}
