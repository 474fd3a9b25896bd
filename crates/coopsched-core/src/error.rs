//! Error types for the cooperative scheduler

use core::fmt;

use crate::id::ThreadId;
use crate::state::ThreadStatus;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// The stack guard of the thread being switched away from was overwritten
    StackOverflow(ThreadId),

    /// A switch was requested before any thread was current
    NoCurrentThread,

    /// Thread id does not name a live thread
    ThreadNotFound(ThreadId),

    /// Dispatch target is already the current thread
    AlreadyCurrent(ThreadId),

    /// Thread status does not allow the requested operation
    InvalidState {
        thread: ThreadId,
        status: ThreadStatus,
    },

    /// A processor is already installed on this OS thread
    AlreadyInitialized,

    /// No processor is installed on this OS thread
    NotInitialized,

    /// Nothing is ready and nothing can ever become ready
    Deadlock {
        blocked: usize,
    },

    /// Stack mapping failed
    Memory(MemoryError),

    /// Configuration rejected
    Config(&'static str),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::StackOverflow(id) => write!(f, "stack overflow detected on thread {}", id),
            SchedError::NoCurrentThread => write!(f, "no current thread"),
            SchedError::ThreadNotFound(id) => write!(f, "thread {} not found", id),
            SchedError::AlreadyCurrent(id) => write!(f, "thread {} is already current", id),
            SchedError::InvalidState { thread, status } => {
                write!(f, "thread {} is in invalid state {}", thread, status)
            }
            SchedError::AlreadyInitialized => write!(f, "processor already initialized"),
            SchedError::NotInitialized => write!(f, "processor not initialized"),
            SchedError::Deadlock { blocked } => {
                write!(f, "deadlock: {} thread(s) blocked with no wake source", blocked)
            }
            SchedError::Memory(e) => write!(f, "memory error: {}", e),
            SchedError::Config(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for SchedError {}

/// Stack memory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed (errno)
    AllocationFailed(i32),

    /// mprotect failed (errno)
    ProtectionFailed(i32),

    /// Requested size is zero or overflows
    InvalidSize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed(errno) => {
                write!(f, "stack allocation failed (errno {})", errno)
            }
            MemoryError::ProtectionFailed(errno) => {
                write!(f, "guard page protection failed (errno {})", errno)
            }
            MemoryError::InvalidSize => write!(f, "invalid stack size"),
        }
    }
}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::Memory(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SchedError::StackOverflow(ThreadId::new(3));
        assert_eq!(format!("{}", e), "stack overflow detected on thread 3");

        let e = SchedError::Memory(MemoryError::AllocationFailed(12));
        assert_eq!(format!("{}", e), "memory error: stack allocation failed (errno 12)");

        let e = SchedError::InvalidState {
            thread: ThreadId::new(1),
            status: ThreadStatus::Blocked,
        };
        assert_eq!(format!("{}", e), "thread 1 is in invalid state BLOCKED");
    }

    #[test]
    fn test_error_conversion() {
        let sched_err: SchedError = MemoryError::InvalidSize.into();
        assert!(matches!(sched_err, SchedError::Memory(MemoryError::InvalidSize)));
    }
}
