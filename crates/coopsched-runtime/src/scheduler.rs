//! Processor: one dispatch core driven by one OS thread
//!
//! The OS thread that installs the processor becomes its bootstrap
//! ("main") thread. Green threads spawned afterwards run on their own
//! stacks and take turns with it. Nothing here is preemptive: a thread
//! runs until it yields, parks or returns.
//!
//! Wake-ups from other OS threads arrive through the remote inbox, which
//! is drained before every scheduling decision.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::Thread;

use crossbeam_queue::SegQueue;

use coopsched_core::error::{SchedError, SchedResult};
use coopsched_core::kprint::{self, LogLevel};
use coopsched_core::{DispatchCore, DispatchStats, Schedulable, ThreadId, ThreadStatus};
use coopsched_core::{kdebug, kerror, kprintln, ktrace, kwarn};

use crate::clock::MonotonicClock;
use crate::config::RuntimeConfig;
use crate::memory::Stack;
use crate::remote::{Inbox, RemoteUnparker};
use crate::thread::{ArchTransfer, Builder, Entry, GreenThread};
use crate::tls;

pub(crate) type Core = DispatchCore<GreenThread, MonotonicClock, ArchTransfer>;

/// Per-OS-thread scheduler state
pub struct Processor {
    core: Core,
    config: RuntimeConfig,
    inbox: Inbox,
    /// OS thread that drives this processor, unparked by remote wakes
    owner: Thread,
    main: ThreadId,
    spawned: u64,
    /// Set when a deadlock is detected away from the bootstrap thread;
    /// reported by the bootstrap thread's pending `park`
    deadlock: Option<usize>,
}

impl Processor {
    fn new(config: RuntimeConfig) -> Self {
        let mut core = DispatchCore::new(MonotonicClock::new(), ArchTransfer);
        let main = core.adopt_current(GreenThread::bootstrap("main", config.main_priority));
        Self {
            core,
            config,
            inbox: Arc::new(SegQueue::new()),
            owner: std::thread::current(),
            main,
            spawned: 0,
            deadlock: None,
        }
    }

    fn spawn(&mut self, builder: Builder, entry: Entry) -> SchedResult<ThreadId> {
        let stack = Stack::allocate(builder.stack_size.unwrap_or(self.config.stack_size))?;
        let name = builder
            .name
            .unwrap_or_else(|| format!("thread-{}", self.spawned + 1));
        let priority = builder.priority.unwrap_or(self.config.default_priority);
        let arg = self as *mut Processor as usize;

        let thread = GreenThread::spawned(
            name,
            priority,
            stack,
            entry,
            builder.space,
            thread_start,
            arg,
        );
        self.spawned += 1;
        let id = self.core.admit(thread);
        kdebug!("Spawned thread {} with priority {}", id, priority);
        Ok(id)
    }

    fn drain_inbox(&mut self) {
        while let Some(id) = self.inbox.pop() {
            ktrace!("Remote wake for thread {}", id);
            self.unpark(id);
        }
    }

    /// Wake `id` if blocked, otherwise leave it a token for its next park
    fn unpark(&mut self, id: ThreadId) -> bool {
        if self.core.wake(id) {
            return true;
        }
        if let Some(thread) = self.core.thread_mut(id) {
            if !thread.status().is_terminated() {
                thread.set_unpark_token();
            }
        }
        false
    }

    fn yield_current(&mut self) -> bool {
        self.drain_inbox();
        self.core.yield_current()
    }

    fn park_current(&mut self) -> SchedResult<()> {
        self.drain_inbox();
        let token = self
            .core
            .current_thread_mut()
            .is_some_and(|t| t.take_unpark_token());
        if token {
            return Ok(());
        }
        self.core.block_current();
        self.reschedule()
    }

    fn remote_handles_outstanding(&self) -> bool {
        Arc::strong_count(&self.inbox) > 1
    }

    fn idle(&self) {
        ktrace!("Idle: nothing ready, waiting for a remote wake");
        std::thread::park_timeout(self.config.idle_park_timeout);
    }

    /// Switch away from a current thread that has blocked or finished
    ///
    /// Returns once the current thread runs again: after a wake, or
    /// straight away if it was woken before a successor was found.
    fn reschedule(&mut self) -> SchedResult<()> {
        loop {
            self.drain_inbox();
            let current = self.core.current().ok_or(SchedError::NoCurrentThread)?;
            if self.core.thread(current).map(|t| t.status()) == Some(ThreadStatus::Running) {
                return Ok(());
            }

            if let Some(next) = self.core.select_next() {
                self.core.dispatch(next);
                if self.core.current() == Some(self.main) {
                    if let Some(blocked) = self.deadlock.take() {
                        return Err(SchedError::Deadlock { blocked });
                    }
                }
                return Ok(());
            }

            if self.remote_handles_outstanding() {
                self.idle();
                continue;
            }

            let blocked = self.core.blocked_count();
            kwarn!("Deadlock: {} thread(s) blocked and no wake source remains", blocked);
            if current == self.main {
                self.core.wake(self.main);
                return Err(SchedError::Deadlock { blocked });
            }
            // Hand the error to the bootstrap thread, which must be parked
            self.deadlock = Some(blocked);
            if !self.core.wake(self.main) {
                kerror!("Deadlock with bootstrap thread not parked; aborting");
                std::process::abort();
            }
        }
    }

    /// Retire the current thread and run something else; never returns
    fn exit_current(&mut self) -> ! {
        self.core.finish_current();
        let result = self.reschedule();
        kerror!("Finished thread resumed ({:?}); aborting", result);
        std::process::abort()
    }

    /// Yield until every spawned thread has finished
    fn run_until_idle(&mut self) -> SchedResult<()> {
        if self.core.current() != Some(self.main) {
            return Err(SchedError::InvalidState {
                thread: self.core.current().ok_or(SchedError::NoCurrentThread)?,
                status: ThreadStatus::Running,
            });
        }
        loop {
            self.drain_inbox();
            if self.core.live_threads() <= 1 {
                return Ok(());
            }
            if self.core.yield_current() {
                continue;
            }
            if self.remote_handles_outstanding() {
                self.idle();
                continue;
            }
            let blocked = self.core.blocked_count();
            kwarn!("Deadlock: {} thread(s) blocked and no wake source remains", blocked);
            return Err(SchedError::Deadlock { blocked });
        }
    }
}

/// Start routine of every spawned thread
extern "C" fn thread_start(arg: usize) -> ! {
    let processor = arg as *mut Processor;

    // SAFETY: the processor is boxed in TLS before any thread is spawned
    // and outlives every thread it runs
    let entry = unsafe {
        (*processor).core.tail();
        (*processor).core.current_thread_mut().and_then(GreenThread::take_entry)
    };

    if let Some(entry) = entry {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
            let msg = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("<non-string panic>");
            let name = unsafe { (*processor).core.current_thread().map(|t| t.name().to_string()) };
            kerror!("Thread \"{}\" panicked: {}", name.unwrap_or_default(), msg);
        }
    }

    unsafe { (*processor).exit_current() }
}

fn with_processor<R>(f: impl FnOnce(&mut Processor) -> R) -> SchedResult<R> {
    let ptr = tls::processor_ptr();
    if ptr.is_null() {
        return Err(SchedError::NotInitialized);
    }
    // SAFETY: installed by `init_processor` and only touched from this OS thread
    Ok(f(unsafe { &mut *ptr }))
}

// ============================================================================
// Public API (used by the coopsched facade)
// ============================================================================

/// Install a processor on the calling OS thread and adopt it as the main thread
pub fn init_processor(config: RuntimeConfig) -> SchedResult<ThreadId> {
    if tls::is_installed() {
        return Err(SchedError::AlreadyInitialized);
    }
    config.validate()?;

    kprint::init();
    if config.debug_logging || cfg!(feature = "debug-logging") {
        kprint::set_log_level(LogLevel::Debug);
    }

    let processor = Box::new(Processor::new(config));
    let main = processor.main;
    if tls::install(processor).is_err() {
        return Err(SchedError::AlreadyInitialized);
    }
    kdebug!("Processor installed, bootstrap thread is {}", main);
    Ok(main)
}

/// Remove the calling OS thread's processor and return its final statistics
///
/// Must run on the bootstrap thread.
pub fn shutdown_processor() -> SchedResult<DispatchStats> {
    let stats = with_processor(|p| -> SchedResult<DispatchStats> {
        let current = p.core.current().ok_or(SchedError::NoCurrentThread)?;
        if current != p.main {
            return Err(SchedError::InvalidState { thread: current, status: ThreadStatus::Running });
        }
        let leftover = p.core.live_threads() - 1;
        if leftover > 0 {
            kwarn!("Shutting down with {} thread(s) that never finished", leftover);
        }
        if p.config.report_stats {
            kprintln!("{}", p.core.stats());
        }
        Ok(p.core.stats().clone())
    })??;

    drop(tls::uninstall());
    kprint::clear_thread_tag();
    Ok(stats)
}

pub fn is_initialized() -> bool {
    tls::is_installed()
}

/// Spawn from a builder; see [`Builder::spawn`]
pub fn spawn_thread(builder: Builder, entry: Entry) -> SchedResult<ThreadId> {
    with_processor(|p| p.spawn(builder, entry))?
}

/// Let the next ready thread run; `false` if nothing else was ready
///
/// Outside a processor this yields the OS thread.
pub fn yield_now() -> bool {
    match with_processor(|p| p.yield_current()) {
        Ok(switched) => switched,
        Err(_) => {
            std::thread::yield_now();
            false
        }
    }
}

/// Block the current thread until [`unpark`] or a remote wake
///
/// Returns at once if an unpark arrived since the last park. Fails with
/// `Deadlock` on the bootstrap thread when no thread can ever run again.
pub fn park() -> SchedResult<()> {
    with_processor(|p| p.park_current())?
}

/// Wake `id`; `true` if it was blocked
///
/// Waking a thread that is not blocked makes its next park return
/// immediately.
pub fn unpark(id: ThreadId) -> SchedResult<bool> {
    with_processor(|p| p.unpark(id))
}

pub fn current_id() -> Option<ThreadId> {
    with_processor(|p| p.core.current()).ok().flatten()
}

pub fn current_name() -> Option<String> {
    with_processor(|p| p.core.current_thread().map(|t| t.name().to_string()))
        .ok()
        .flatten()
}

/// Address range `(bottom, top)` of the running thread's stack
///
/// `None` for the bootstrap thread, which runs on the OS thread's stack,
/// and outside a processor.
pub fn current_stack_bounds() -> Option<(usize, usize)> {
    with_processor(|p| {
        p.core
            .current_thread()
            .and_then(|t| t.stack())
            .map(|s| (s.bottom() as usize, s.top() as usize))
    })
    .ok()
    .flatten()
}

/// Handle for waking this processor's threads from other OS threads
pub fn remote_unparker() -> SchedResult<RemoteUnparker> {
    with_processor(|p| RemoteUnparker::new(p.inbox.clone(), p.owner.clone()))
}

/// Run other threads until every spawned thread has finished
pub fn run_until_idle() -> SchedResult<()> {
    with_processor(|p| p.run_until_idle())?
}

pub fn stats() -> SchedResult<DispatchStats> {
    with_processor(|p| p.core.stats().clone())
}

/// Live threads including the bootstrap thread
pub fn live_threads() -> SchedResult<usize> {
    with_processor(|p| p.core.live_threads())
}

/// Print the ready queue to stderr
pub fn dump_ready() -> SchedResult<()> {
    with_processor(|p| p.core.print_ready())
}
