//! # coopsched-runtime
//!
//! Host runtime for the coopsched dispatch core.
//!
//! This crate provides:
//! - Stack mapping with guard pages and fenceposts (mmap)
//! - Context switching (architecture-specific assembly)
//! - A monotonic clock
//! - The per-OS-thread processor: spawn, yield, park/unpark, remote wakes
//! - Build-time and environment configuration

pub mod config;
pub mod memory;
pub mod arch;
pub mod clock;
pub mod thread;
pub mod remote;
pub mod scheduler;
pub mod tls;

// Re-exports
pub use config::{ConfigError, RuntimeConfig};
pub use clock::MonotonicClock;
pub use memory::Stack;
pub use remote::RemoteUnparker;
pub use thread::{ArchTransfer, Builder, GreenThread};
