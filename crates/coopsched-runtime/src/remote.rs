//! Wake-ups from other OS threads
//!
//! The dispatch core is owned by one OS thread. Other threads cannot touch
//! it; they push thread ids into an inbox that the processor drains at
//! every scheduling decision, then unpark the processor's OS thread in
//! case it is idle.

use std::sync::Arc;
use std::thread::Thread;

use crossbeam_queue::SegQueue;

use coopsched_core::ThreadId;

pub(crate) type Inbox = Arc<SegQueue<ThreadId>>;

/// Handle for waking green threads from any OS thread
///
/// While any handle is alive the processor treats an empty ready queue as
/// "wait for a remote wake" rather than a deadlock.
#[derive(Clone)]
pub struct RemoteUnparker {
    inbox: Inbox,
    owner: Thread,
}

impl RemoteUnparker {
    pub(crate) fn new(inbox: Inbox, owner: Thread) -> Self {
        Self { inbox, owner }
    }

    /// Queue a wake for `id` on the owning processor
    pub fn unpark(&self, id: ThreadId) {
        self.inbox.push(id);
        self.owner.unpark();
    }
}

impl std::fmt::Debug for RemoteUnparker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteUnparker")
            .field("owner", &self.owner.id())
            .field("queued", &self.inbox.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpark_from_other_thread() {
        let inbox: Inbox = Arc::new(SegQueue::new());
        let remote = RemoteUnparker::new(inbox.clone(), std::thread::current());

        let handle = std::thread::spawn(move || {
            remote.unpark(ThreadId::new(7));
            remote.unpark(ThreadId::new(9));
        });
        handle.join().unwrap();

        assert_eq!(inbox.pop(), Some(ThreadId::new(7)));
        assert_eq!(inbox.pop(), Some(ThreadId::new(9)));
        assert_eq!(inbox.pop(), None);
        assert_eq!(Arc::strong_count(&inbox), 1);
    }
}
