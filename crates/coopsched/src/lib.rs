//! # coopsched - cooperative uniprocessor thread scheduler
//!
//! Green threads on one OS thread, dispatched by priority. A thread runs
//! until it yields, parks or returns; nothing is preempted.
//!
//! ## Features
//!
//! - **Priority dispatch**: lower value runs first, FIFO among equals
//! - **Deferred destruction**: a finished thread's stack is released by
//!   the next thread to run, never while it is still in use
//! - **Overflow detection**: guard page plus a fencepost checked on every
//!   switch away from a thread
//! - **Accounting**: per-thread wait/run totals and processor-wide
//!   burst statistics
//! - **Remote wakes**: other OS threads can unpark green threads
//!
//! ## Quick Start
//!
//! ```ignore
//! use coopsched::{Runtime, RuntimeConfig, spawn, yield_now};
//!
//! fn main() -> coopsched::SchedResult<()> {
//!     let mut runtime = Runtime::new(RuntimeConfig::from_env())?;
//!
//!     runtime.block_on(|| {
//!         spawn(|| {
//!             println!("Hello from a green thread!");
//!             yield_now();
//!             println!("Back again!");
//!         })
//!         .expect("spawn");
//!     })?;
//!
//!     let stats = runtime.shutdown()?;
//!     println!("{}", stats);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        spawn(), yield_now(), park(), unpark()               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Processor (per OS thread)                   │
//! │       remote inbox, idle policy, thread start/exit          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Dispatch core                            │
//! │   ready queue, current thread, epilogue, statistics         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┴───────────────────┐
//!          ▼                                       ▼
//!    ┌──────────────┐                      ┌──────────────┐
//!    │ Stack switch │                      │    Stacks    │
//!    │ (asm)        │                      │ mmap + guard │
//!    └──────────────┘                      └──────────────┘
//! ```

use std::marker::PhantomData;

// Re-export core types
pub use coopsched_core::{
    AddressSpace,
    DispatchStats,
    MemoryError,
    Priority,
    SchedError,
    SchedResult,
    ThreadAccounting,
    ThreadId,
    ThreadStatus,
};

// Re-export kprint macros for debug logging
pub use coopsched_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use coopsched_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use coopsched_core::{env_get, env_get_bool, env_get_opt};

// Re-export runtime types
pub use coopsched_runtime::{Builder, ConfigError, RemoteUnparker, RuntimeConfig};

use coopsched_runtime::scheduler;

/// Handle owning the processor installed on the current OS thread
///
/// The OS thread that creates the runtime becomes its main green thread.
/// Dropping the runtime removes the processor.
pub struct Runtime {
    main: ThreadId,
    active: bool,
    /// The processor lives in this OS thread's TLS
    _not_send: PhantomData<*const ()>,
}

impl Runtime {
    /// Install a processor on the calling OS thread
    ///
    /// Fails with `AlreadyInitialized` if this OS thread already has one,
    /// or `Config` if the configuration does not validate.
    pub fn new(config: RuntimeConfig) -> SchedResult<Self> {
        let main = scheduler::init_processor(config)?;
        Ok(Self {
            main,
            active: true,
            _not_send: PhantomData,
        })
    }

    /// Id of the adopted bootstrap thread
    pub fn main_thread(&self) -> ThreadId {
        self.main
    }

    /// Run `f` on the main thread, then let spawned threads run until
    /// all of them have finished
    ///
    /// Fails with `Deadlock` if the remaining threads are all blocked and
    /// no [`RemoteUnparker`] is alive to wake them.
    pub fn block_on<F, T>(&mut self, f: F) -> SchedResult<T>
    where
        F: FnOnce() -> T,
    {
        let result = f();
        scheduler::run_until_idle()?;
        Ok(result)
    }

    /// Spawn a new thread with the default priority
    pub fn spawn<F>(&self, f: F) -> SchedResult<ThreadId>
    where
        F: FnOnce() + 'static,
    {
        spawn(f)
    }

    /// Spawn a new thread with the given priority
    pub fn spawn_with_priority<F>(&self, f: F, priority: Priority) -> SchedResult<ThreadId>
    where
        F: FnOnce() + 'static,
    {
        spawn_with_priority(f, priority)
    }

    pub fn stats(&self) -> SchedResult<DispatchStats> {
        scheduler::stats()
    }

    /// Print the ready queue to stderr
    pub fn dump_ready(&self) -> SchedResult<()> {
        scheduler::dump_ready()
    }

    pub fn remote_unparker(&self) -> SchedResult<RemoteUnparker> {
        scheduler::remote_unparker()
    }

    /// Remove the processor and return its final statistics
    pub fn shutdown(mut self) -> SchedResult<DispatchStats> {
        self.active = false;
        scheduler::shutdown_processor()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if self.active {
            if let Err(e) = scheduler::shutdown_processor() {
                kwarn!("Runtime dropped without a clean shutdown: {}", e);
            }
        }
    }
}

/// Spawn a new thread with the default priority
///
/// # Example
///
/// ```ignore
/// use coopsched::spawn;
///
/// spawn(|| {
///     println!("Hello!");
/// })?;
/// ```
pub fn spawn<F>(f: F) -> SchedResult<ThreadId>
where
    F: FnOnce() + 'static,
{
    Builder::new().spawn(f)
}

/// Spawn a new thread with the given priority (lower runs first)
pub fn spawn_with_priority<F>(f: F, priority: Priority) -> SchedResult<ThreadId>
where
    F: FnOnce() + 'static,
{
    Builder::new().priority(priority).spawn(f)
}

/// Let another ready thread run
///
/// Returns `false` if no other thread was ready, in which case the caller
/// simply keeps running.
pub fn yield_now() -> bool {
    scheduler::yield_now()
}

/// Block the current thread until it is unparked
pub fn park() -> SchedResult<()> {
    scheduler::park()
}

/// Wake a parked thread; `true` if it was parked
pub fn unpark(id: ThreadId) -> SchedResult<bool> {
    scheduler::unpark(id)
}

/// Id of the running thread, or `None` outside a runtime
pub fn current_id() -> Option<ThreadId> {
    scheduler::current_id()
}

/// Name of the running thread, or `None` outside a runtime
pub fn current_name() -> Option<String> {
    scheduler::current_name()
}

/// Address range `(bottom, top)` of the running thread's stack
///
/// `None` on the main thread and outside a runtime.
pub fn current_stack_bounds() -> Option<(usize, usize)> {
    scheduler::current_stack_bounds()
}

/// Handle for waking this runtime's threads from other OS threads
pub fn remote_unparker() -> SchedResult<RemoteUnparker> {
    scheduler::remote_unparker()
}

/// Print the ready queue of the current OS thread's runtime to stderr
pub fn dump_ready() -> SchedResult<()> {
    scheduler::dump_ready()
}
