//! Thread status and priority types

use core::fmt;

/// Status of a logical thread
///
/// `Running` is held by at most one thread: the dispatcher's current thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ThreadStatus {
    /// Created, not yet admitted to the ready queue
    New = 0,

    /// Runnable, waiting in the ready queue
    Ready = 1,

    /// Owns the processor
    Running = 2,

    /// Waiting for an explicit wake-up
    Blocked = 3,

    /// Terminal; resources are reclaimed by a later resume epilogue
    Finished = 4,
}

impl ThreadStatus {
    /// Check if this status allows the thread to be selected
    #[inline]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, ThreadStatus::Ready)
    }

    /// Check if the thread has terminated
    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, ThreadStatus::Finished)
    }

    /// Check whether `self -> next` is an edge of the thread state machine
    ///
    /// ```text
    /// New -> Ready -> Running -> {Ready, Blocked, Finished}
    /// Blocked -> Ready
    /// New -> Running        (adopting the bootstrap thread)
    /// Blocked -> Running    (woken before it was switched away from)
    /// ```
    pub const fn can_transition_to(&self, next: ThreadStatus) -> bool {
        matches!(
            (self, next),
            (ThreadStatus::New, ThreadStatus::Ready)
                | (ThreadStatus::Ready, ThreadStatus::Running)
                | (ThreadStatus::Running, ThreadStatus::Ready)
                | (ThreadStatus::Running, ThreadStatus::Blocked)
                | (ThreadStatus::Running, ThreadStatus::Finished)
                | (ThreadStatus::Blocked, ThreadStatus::Ready)
                | (ThreadStatus::New, ThreadStatus::Running)
                | (ThreadStatus::Blocked, ThreadStatus::Running)
        )
    }
}

impl fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadStatus::New => write!(f, "NEW"),
            ThreadStatus::Ready => write!(f, "READY"),
            ThreadStatus::Running => write!(f, "RUNNING"),
            ThreadStatus::Blocked => write!(f, "BLOCKED"),
            ThreadStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Scheduling priority
///
/// Numeric and immutable for the life of a thread. Lower values are more
/// urgent; threads of equal priority run in the order they became ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Priority(i32);

impl Priority {
    /// Most urgent priority
    pub const HIGHEST: Priority = Priority(i32::MIN);

    /// Default for spawned threads
    pub const NORMAL: Priority = Priority(10);

    /// Least urgent priority
    pub const LOWEST: Priority = Priority(i32::MAX);

    #[inline]
    pub const fn new(value: i32) -> Self {
        Priority(value)
    }

    #[inline]
    pub const fn value(self) -> i32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

impl From<i32> for Priority {
    fn from(v: i32) -> Self {
        Priority(v)
    }
}

impl From<Priority> for i32 {
    fn from(p: Priority) -> i32 {
        p.0
    }
}

impl std::str::FromStr for Priority {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i32>().map(Priority)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(ThreadStatus::Ready.is_runnable());
        assert!(!ThreadStatus::Running.is_runnable());
        assert!(!ThreadStatus::Blocked.is_runnable());

        assert!(ThreadStatus::Finished.is_terminated());
        assert!(!ThreadStatus::Running.is_terminated());
    }

    #[test]
    fn test_state_machine_edges() {
        use ThreadStatus::*;
        assert!(New.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Running));
        assert!(Running.can_transition_to(Blocked));
        assert!(Running.can_transition_to(Finished));
        assert!(Blocked.can_transition_to(Ready));

        assert!(Blocked.can_transition_to(Running));
        assert!(!Finished.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Blocked));
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::HIGHEST < Priority::new(0));
        assert!(Priority::new(1) < Priority::new(5));
        assert!(Priority::NORMAL < Priority::LOWEST);
        assert_eq!(Priority::default(), Priority::NORMAL);
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!(" -3 ".parse::<Priority>(), Ok(Priority::new(-3)));
        assert!("urgent".parse::<Priority>().is_err());
    }
}
