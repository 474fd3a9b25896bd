//! Dispatch core
//!
//! Owns the current thread, the ready queue, the deferred-destruction slot
//! and the aggregate statistics for one logical processor.
//!
//! Every method takes `&mut self`: holding the core mutably *is* the
//! "preemption disabled" guarantee. No method blocks.
//!
//! # Dispatch protocol
//!
//! ```text
//!   old (running)                               next (ready)
//!   ─────────────                               ────────────
//!   save old address space
//!   overflow check on old ──► abort
//!   wait accounting for next, next = RUNNING
//!   current = next
//!   transfer(old, next) ─────────────────────►  resumes after its own
//!        ┆ suspended                            transfer(), or enters its
//!        ┆                                      start routine and calls tail()
//!        ┆                                      on_resume():
//!        ┆                                        reclaim pending_destruction
//!        ┆                                        restore next address space
//!   ◄─── some later dispatch(old)
//!   on_resume()
//! ```
//!
//! The code after `transfer` runs on whichever thread is resumed into this
//! activation, which is never the thread that was current when the call
//! was made. That is why the epilogue reads everything from `self` and
//! nothing from locals captured before the switch.

use core::ptr::NonNull;
use core::sync::atomic::{compiler_fence, Ordering};

use crate::id::ThreadId;
use crate::kprint;
use crate::ready_queue::{ReadyEntry, ReadyQueue};
use crate::state::ThreadStatus;
use crate::stats::DispatchStats;
use crate::table::ThreadTable;
use crate::traits::{Clock, ContextTransfer, Schedulable};
use crate::error::{SchedError, SchedResult};
use crate::{kdebug, kerror, kprintln, ktrace};

pub struct DispatchCore<T, C, X> {
    threads: ThreadTable<T>,
    ready: ReadyQueue,
    current: Option<ThreadId>,
    /// Finished thread whose stack may still be executing
    pending_destruction: Option<ThreadId>,
    /// Set when a switch lands on a thread whose address space has not
    /// been restored yet; consumed by the epilogue
    restore_due: bool,
    stats: DispatchStats,
    clock: C,
    transfer: X,
}

impl<T, C, X> DispatchCore<T, C, X>
where
    T: Schedulable,
    C: Clock,
    X: ContextTransfer<T>,
{
    pub fn new(clock: C, transfer: X) -> Self {
        let now = clock.now();
        Self {
            threads: ThreadTable::new(),
            ready: ReadyQueue::new(),
            current: None,
            pending_destruction: None,
            restore_due: false,
            stats: DispatchStats::new(now),
            clock,
            transfer,
        }
    }

    /// Make the already-executing bootstrap thread the current thread
    ///
    /// # Panics
    ///
    /// If a thread is already current.
    pub fn adopt_current(&mut self, mut thread: T) -> ThreadId {
        assert!(self.current.is_none(), "a current thread is already installed");
        let now = self.clock.now();
        thread.set_status(ThreadStatus::Running);
        thread.accounting_mut().burst_snapshot = now;
        let id = self.threads.insert(thread);
        self.current = Some(id);
        self.stats.total_threads += 1;
        kprint::set_thread_tag(id.as_u32());
        kdebug!("Adopted bootstrap thread \"{}\" ({})", self.thread_ref(id).name(), id);
        id
    }

    /// Take ownership of a new thread and make it ready
    pub fn admit(&mut self, thread: T) -> ThreadId {
        let status = thread.status();
        assert!(
            matches!(status, ThreadStatus::New | ThreadStatus::Ready),
            "admitted thread must be new, found {}",
            status
        );
        let id = self.threads.insert(thread);
        self.stats.total_threads += 1;
        self.move_to_ready(id);
        id
    }

    /// Mark `id` ready and queue it; starts its wait-accounting period
    ///
    /// # Panics
    ///
    /// If `id` is the current thread, is already queued, or is not live.
    pub fn move_to_ready(&mut self, id: ThreadId) {
        assert!(
            self.current != Some(id),
            "current thread {} cannot join the ready queue",
            id
        );
        let now = self.clock.now();
        let thread = self.thread_slot(id);
        kdebug!("Putting thread \"{}\" ({}) on ready list", thread.name(), id);
        thread.set_status(ThreadStatus::Ready);
        thread.accounting_mut().wait_snapshot = now;
        let priority = thread.priority();
        self.ready.insert(id, priority);
        check_invariants(&self.threads, &self.ready, self.current);
    }

    /// Remove and return the next thread to run, or `None` if none is ready
    ///
    /// Touches nothing but the ready queue.
    #[inline]
    pub fn select_next(&mut self) -> Option<ThreadId> {
        self.ready.remove_next().map(|entry| entry.id)
    }

    /// Hand the processor to `next`
    ///
    /// `next` must have come from [`select_next`](Self::select_next), and
    /// the current thread must already have given up RUNNING (see
    /// [`yield_current`](Self::yield_current), [`block_current`](Self::block_current),
    /// [`finish_current`](Self::finish_current)). A current thread left in
    /// READY rejoins the ready queue once `next` is current.
    ///
    /// Returns when some later dispatch resumes the calling thread. Never
    /// returns for a finished thread.
    ///
    /// # Panics
    ///
    /// On caller contract violations. A stack overflow on the outgoing
    /// thread aborts the process.
    pub fn dispatch(&mut self, next: ThreadId) {
        let (from, to) = match self.prepare_switch(next) {
            Ok(pair) => pair,
            Err(err @ SchedError::StackOverflow(_)) => fatal(err),
            Err(err) => panic!("dispatch contract violated: {}", err),
        };

        // Other stacks mutate the core while this one is suspended. Past
        // this point the core is only reached through `this`, so nothing
        // read before the switch is reused after it.
        let this: *mut Self = self;
        compiler_fence(Ordering::SeqCst);

        // SAFETY: `from` is the thread executing this call, `to` was
        // selected from the ready queue; both are boxed in the table and
        // neither can be reclaimed before it has been switched away from.
        // `this` outlives every thread it dispatches.
        unsafe {
            (*this).transfer.transfer(from, to);
            compiler_fence(Ordering::SeqCst);
            // Resumed: whoever dispatched back to us set up the epilogue
            (*this).on_resume();
        }
    }

    /// Resume epilogue for a thread running for the first time
    ///
    /// Start routines call this before any other work.
    pub fn tail(&mut self) {
        self.on_resume();
    }

    /// Give the processor to the next ready thread, if there is one
    ///
    /// The caller rejoins the ready queue behind threads of its own
    /// priority. Returns `false` without side effects if nothing is ready.
    pub fn yield_current(&mut self) -> bool {
        let Some(next) = self.select_next() else {
            return false;
        };
        self.end_burst(ThreadStatus::Ready);
        self.dispatch(next);
        true
    }

    /// Mark the current thread blocked and end its burst
    ///
    /// The caller then selects a successor and dispatches to it; until
    /// it does, the blocked thread remains current.
    pub fn block_current(&mut self) -> ThreadId {
        self.end_burst(ThreadStatus::Blocked)
    }

    /// Mark the current thread finished and park it for destruction
    ///
    /// Its resources are released by the epilogue of the dispatch that
    /// switches away from it.
    ///
    /// # Panics
    ///
    /// If a previous retirement has not been reclaimed.
    pub fn finish_current(&mut self) -> ThreadId {
        assert!(
            self.pending_destruction.is_none(),
            "a finished thread is still awaiting destruction"
        );
        let id = self.end_burst(ThreadStatus::Finished);
        self.pending_destruction = Some(id);
        kdebug!("Thread \"{}\" ({}) finished", self.thread_ref(id).name(), id);
        id
    }

    /// Make a blocked thread ready again
    ///
    /// A thread that blocked but is still current (no successor was
    /// dispatched yet) goes straight back to RUNNING. Returns `false` if
    /// `id` is not blocked.
    pub fn wake(&mut self, id: ThreadId) -> bool {
        match self.threads.get(id).map(|t| t.status()) {
            Some(ThreadStatus::Blocked) => {}
            _ => return false,
        }
        if self.current == Some(id) {
            let now = self.clock.now();
            let thread = self.thread_slot(id);
            thread.set_status(ThreadStatus::Running);
            thread.accounting_mut().burst_snapshot = now;
            kdebug!("Thread \"{}\" ({}) woken before switching away", thread.name(), id);
            return true;
        }
        self.move_to_ready(id);
        true
    }

    // ------------------------------------------------------------------
    // Accessors and diagnostics
    // ------------------------------------------------------------------

    #[inline]
    pub fn current(&self) -> Option<ThreadId> {
        self.current
    }

    pub fn current_thread(&self) -> Option<&T> {
        self.current.and_then(|id| self.threads.get(id))
    }

    pub fn current_thread_mut(&mut self) -> Option<&mut T> {
        self.current.and_then(|id| self.threads.get_mut(id))
    }

    #[inline]
    pub fn thread(&self, id: ThreadId) -> Option<&T> {
        self.threads.get(id)
    }

    #[inline]
    pub fn thread_mut(&mut self, id: ThreadId) -> Option<&mut T> {
        self.threads.get_mut(id)
    }

    #[inline]
    pub fn pending_destruction(&self) -> Option<ThreadId> {
        self.pending_destruction
    }

    #[inline]
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Live threads, including the current one
    #[inline]
    pub fn live_threads(&self) -> usize {
        self.threads.len()
    }

    #[inline]
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    #[inline]
    pub fn is_ready(&self, id: ThreadId) -> bool {
        self.ready.contains(id)
    }

    /// Threads currently in BLOCKED
    pub fn blocked_count(&self) -> usize {
        self.threads
            .iter()
            .filter(|(_, t)| t.status() == ThreadStatus::Blocked)
            .count()
    }

    /// Ready queue contents in dispatch order
    pub fn ready_snapshot(&self) -> Vec<ReadyEntry> {
        self.ready.snapshot()
    }

    /// Dump the ready queue to stderr
    pub fn print_ready(&self) {
        kprintln!("Ready list contents:");
        for entry in self.ready.snapshot() {
            let name = self.threads.get(entry.id).map_or("?", |t| t.name());
            kprintln!("  \"{}\" ({}) priority {}", name, entry.id, entry.priority);
        }
    }

    // ------------------------------------------------------------------
    // Protocol internals
    // ------------------------------------------------------------------

    /// Steps 1-4 of a dispatch: everything that happens before the switch
    ///
    /// Contract checks come first and have no side effects. An overflow is
    /// reported after the outgoing address space is saved and before any
    /// dispatcher state changes.
    fn prepare_switch(&mut self, next: ThreadId) -> SchedResult<(NonNull<T>, NonNull<T>)> {
        let old = self.current.ok_or(SchedError::NoCurrentThread)?;
        if old == next {
            return Err(SchedError::AlreadyCurrent(next));
        }
        let next_status = self
            .threads
            .get(next)
            .ok_or(SchedError::ThreadNotFound(next))?
            .status();
        if next_status != ThreadStatus::Ready || self.ready.contains(next) {
            return Err(SchedError::InvalidState { thread: next, status: next_status });
        }

        let old_thread = self.threads.get_mut(old).ok_or(SchedError::ThreadNotFound(old))?;
        let old_status = old_thread.status();
        if old_status == ThreadStatus::Running {
            return Err(SchedError::InvalidState { thread: old, status: old_status });
        }

        if let Some(space) = old_thread.address_space() {
            space.save_registers();
            space.save_context();
        }

        if old_thread.stack_overflowed() {
            return Err(SchedError::StackOverflow(old));
        }

        let now = self.clock.now();
        let next_thread = self.thread_slot(next);
        let acct = next_thread.accounting_mut();
        let waited = now.saturating_sub(acct.wait_snapshot);
        acct.total_wait += waited;
        acct.burst_snapshot = now;
        acct.dispatches += 1;
        next_thread.set_status(ThreadStatus::Running);
        self.stats.record_wait(waited, now);
        self.stats.dispatches += 1;
        self.current = Some(next);
        self.restore_due = true;

        if old_status == ThreadStatus::Ready {
            self.move_to_ready(old);
        }

        ktrace!(
            "Switching from \"{}\" ({}) to \"{}\" ({}) after waiting {}",
            self.thread_ref(old).name(),
            old,
            self.thread_ref(next).name(),
            next,
            waited
        );
        check_invariants(&self.threads, &self.ready, self.current);

        let from = self.threads.as_ptr(old).ok_or(SchedError::ThreadNotFound(old))?;
        let to = self.threads.as_ptr(next).ok_or(SchedError::ThreadNotFound(next))?;
        Ok((from, to))
    }

    /// Shared resume epilogue
    ///
    /// Idempotent: a second run with nothing newly pending does nothing.
    fn on_resume(&mut self) {
        if let Some(victim) = self.pending_destruction.take() {
            debug_assert_ne!(Some(victim), self.current, "reclaiming the running thread");
            if let Some(thread) = self.threads.remove(victim) {
                kdebug!("Reclaiming finished thread \"{}\" ({})", thread.name(), victim);
                self.stats.reclaimed += 1;
                drop(thread);
            }
        }

        let Some(id) = self.current else {
            return;
        };
        kprint::set_thread_tag(id.as_u32());
        if !std::mem::take(&mut self.restore_due) {
            return;
        }
        ktrace!("Now in thread \"{}\" ({})", self.thread_ref(id).name(), id);
        if let Some(space) = self.threads.get_mut(id).and_then(|t| t.address_space()) {
            space.restore_registers();
            space.restore_context();
        }
    }

    /// End the current thread's running period and move it to `status`
    fn end_burst(&mut self, status: ThreadStatus) -> ThreadId {
        let Some(id) = self.current else {
            panic!("{}", SchedError::NoCurrentThread);
        };
        let now = self.clock.now();
        let thread = self.thread_slot(id);
        assert_eq!(
            thread.status(),
            ThreadStatus::Running,
            "current thread {} is not running",
            id
        );
        let acct = thread.accounting_mut();
        let burst = now.saturating_sub(acct.burst_snapshot);
        acct.total_run += burst;
        thread.set_status(status);
        self.stats.record_burst(burst, now);
        id
    }

    fn thread_slot(&mut self, id: ThreadId) -> &mut T {
        match self.threads.get_mut(id) {
            Some(thread) => thread,
            None => panic!("{}", SchedError::ThreadNotFound(id)),
        }
    }

    fn thread_ref(&self, id: ThreadId) -> &T {
        match self.threads.get(id) {
            Some(thread) => thread,
            None => panic!("{}", SchedError::ThreadNotFound(id)),
        }
    }
}

#[cold]
fn fatal(err: SchedError) -> ! {
    kerror!("{}: memory outside the thread's stack may be corrupt, aborting", err);
    std::process::abort()
}

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "debug-assertions"))] {
        /// Full scan of the single-runner and queue-membership invariants
        fn check_invariants<T: Schedulable>(
            threads: &ThreadTable<T>,
            ready: &ReadyQueue,
            current: Option<ThreadId>,
        ) {
            for (id, thread) in threads.iter() {
                let running = thread.status() == ThreadStatus::Running;
                assert!(!running || current == Some(id), "thread {} running but not current", id);
                if ready.contains(id) {
                    assert_eq!(thread.status(), ThreadStatus::Ready, "queued thread {} not ready", id);
                }
            }
            if let Some(id) = current {
                assert!(!ready.contains(id), "current thread {} is queued", id);
            }
        }
    } else {
        #[inline(always)]
        fn check_invariants<T: Schedulable>(
            _threads: &ThreadTable<T>,
            _ready: &ReadyQueue,
            _current: Option<ThreadId>,
        ) {
        }
    }
}
