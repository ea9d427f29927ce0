//! Execution stream with ticketed tracking of in-flight asynchronous work
//!
//! Kernel issuance is asynchronous: the dispatcher enqueues work and returns
//! before the device has executed it. Each issued operation takes a
//! monotonically increasing ticket; operand buffers record the ticket of
//! their last enqueued write so a later operation can detect the hazard and
//! block until the stream has drained.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// A device execution stream.
///
/// Work issued on one stream executes in issue order; `synchronize` blocks
/// the host until everything issued so far has completed. A stalled device
/// stream stalls `synchronize` indefinitely; no timeout is provided.
#[derive(Debug)]
pub struct Stream {
    id: u64,
    device: usize,
    issued: AtomicU64,
    completed: AtomicU64,
    syncs: AtomicU64,
}

impl Stream {
    pub(crate) fn new(device: usize) -> Self {
        Self {
            id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
            device,
            issued: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            syncs: AtomicU64::new(0),
        }
    }

    /// Process-unique stream identifier
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Device ordinal this stream issues onto
    #[inline]
    pub fn device(&self) -> usize {
        self.device
    }

    /// Take a ticket for a new operation about to be issued.
    ///
    /// Must be called with the context handle held; tickets are in issuance
    /// order because issuance is serialized per device.
    pub(crate) fn begin_issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Returns true if the work under `ticket` has completed.
    ///
    /// Ticket 0 means "no work recorded" and is always complete.
    #[inline]
    pub fn is_complete(&self, ticket: u64) -> bool {
        ticket <= self.completed.load(Ordering::SeqCst)
    }

    /// Block until all issued work has completed.
    pub fn synchronize(&self) {
        // Host-backed streams drain immediately; a real device backend waits
        // on the underlying stream before reporting completion.
        let issued = self.issued.load(Ordering::SeqCst);
        self.completed.fetch_max(issued, Ordering::SeqCst);
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of blocking synchronizations performed on this stream.
    ///
    /// Observable so hazard-resolution behavior can be asserted in tests.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_monotonic() {
        let s = Stream::new(0);
        let t1 = s.begin_issue();
        let t2 = s.begin_issue();
        assert!(t2 > t1);
    }

    #[test]
    fn issued_work_pends_until_synchronize() {
        let s = Stream::new(0);
        assert!(s.is_complete(0));

        let t = s.begin_issue();
        assert!(!s.is_complete(t));

        s.synchronize();
        assert!(s.is_complete(t));
        assert_eq!(s.sync_count(), 1);
    }
}
