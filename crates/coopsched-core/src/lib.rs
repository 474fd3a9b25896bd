//! # coopsched-core
//!
//! Core types and the dispatch protocol for a cooperative uniprocessor
//! thread scheduler.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stacks, register switching and the clock live in `coopsched-runtime`.
//!
//! ## Modules
//!
//! - `id` - Thread identifier type
//! - `state` - Thread status and priority
//! - `ready_queue` - Stable priority queue of runnable threads
//! - `table` - Arena owning every live thread
//! - `dispatch` - Current thread, dispatch and resume epilogue
//! - `stats` - Wait/burst accounting
//! - `error` - Error types
//! - `traits` - Clock, address space and context transfer seams
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod ready_queue;
pub mod table;
pub mod dispatch;
pub mod stats;
pub mod error;
pub mod traits;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::{Priority, ThreadStatus};
pub use ready_queue::{ReadyEntry, ReadyQueue};
pub use table::ThreadTable;
pub use dispatch::DispatchCore;
pub use stats::{DispatchStats, ThreadAccounting};
pub use error::{MemoryError, SchedError, SchedResult};
pub use traits::{AddressSpace, Clock, ContextTransfer, Schedulable};
pub use env::{env_get, env_get_bool, env_get_opt};

/// Constants for stack layout
pub mod constants {
    /// Guard page size below every allocated stack (4 KB)
    pub const GUARD_SIZE: usize = 4096;

    /// Word written at the low end of every stack and checked on switch-out
    pub const STACK_FENCEPOST: u64 = 0xdead_beef_dead_beef;

    /// Smallest usable stack accepted by the runtime configuration
    pub const MIN_STACK_SIZE: usize = 16 * 1024;
}
