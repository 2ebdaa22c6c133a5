//! 🚦 The Drain Coordinator: the bouncer standing between the buffer and everyone
//! who wants a piece of it.
//!
//! 🎬 *[two triggers reach for the buffer at the same time. the mutex raises one eyebrow.]*
//!
//! Everything that touches the [`BatchBuffer`] goes through here:
//! - the source worker appends lines,
//! - the triggers request drains,
//! - the drain workers take snapshots.
//!
//! 🧠 Knowledge graph:
//! - One `std::sync::Mutex` guards the buffer. It is held for a push or a `mem::take`,
//!   never across an `.await`, never across the network.
//! - Drain requests are tiny signals on a bounded `async_channel`. A request does not
//!   carry lines; the worker that *receives* it takes the snapshot. So a queued request
//!   always captures whatever is buffered at the moment it is served.
//! - That makes a full queue harmless: the request we fail to enqueue is covered by
//!   one already waiting. We coalesce instead of blocking the producer.
//! - Closing the queue is the shutdown signal for the timer and the drain workers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_channel::{Receiver, Sender, TrySendError};
use tracing::trace;

use crate::buffer::BatchBuffer;
use crate::common::LogLine;
use crate::stats::DrainStats;

/// 🔔 Who rang the bell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrainReason {
    Timer,
    SizeLimit,
}

/// 📬 What happened to a drain request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestStatus {
    /// ✅ On the queue; a drain worker will pick it up.
    Queued,
    /// 🤝 Queue full of requests that will cover this one anyway.
    Coalesced,
    /// 🕳️ Nothing buffered. Nothing to do. Not even a log line.
    Empty,
    /// 🏁 Shutting down. The final drain will handle the rest.
    Closed,
}

/// 📸 The lines captured by one snapshot-and-clear.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub sequence: u64,
    pub lines: Vec<LogLine>,
}

#[derive(Debug, Default)]
struct Guarded {
    buffer: BatchBuffer,
    next_sequence: u64,
}

/// 🚦 Owns the buffer and the drain request queue.
#[derive(Debug)]
pub(crate) struct DrainCoordinator {
    guarded: Mutex<Guarded>,
    requests: Sender<DrainReason>,
    stats: Arc<DrainStats>,
}

impl DrainCoordinator {
    /// 🏗️ Returns the coordinator plus the receiving end of its request queue,
    /// which the drain workers share.
    pub(crate) fn new(
        pending_drain_requests: usize,
        stats: Arc<DrainStats>,
    ) -> (Arc<Self>, Receiver<DrainReason>) {
        let (requests, receiver) = async_channel::bounded(pending_drain_requests.max(1));
        let coordinator = Arc::new(Self {
            guarded: Mutex::new(Guarded::default()),
            requests,
            stats,
        });
        (coordinator, receiver)
    }

    // 🔒 A panic while holding the lock can only interrupt a push or a take, both of
    // which leave the Vec valid, so a poisoned lock is still a usable lock.
    fn lock(&self) -> MutexGuard<'_, Guarded> {
        self.guarded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// ➕ Append one line. Returns the number of lines now waiting.
    pub(crate) fn append(&self, line: LogLine) -> usize {
        let waiting = self.lock().buffer.append(line);
        self.stats.line_ingested();
        waiting
    }

    pub(crate) fn buffered(&self) -> usize {
        self.lock().buffer.len()
    }

    /// 🔔 Ask for a drain. Never blocks, never awaits.
    pub(crate) fn request_drain(&self, reason: DrainReason) -> RequestStatus {
        if self.requests.is_closed() {
            return RequestStatus::Closed;
        }
        if self.lock().buffer.is_empty() {
            trace!("🕳️ {:?} drain requested on an empty buffer, ignoring", reason);
            return RequestStatus::Empty;
        }
        match self.requests.try_send(reason) {
            Ok(()) => {
                self.stats.drain_requested();
                RequestStatus::Queued
            }
            Err(TrySendError::Full(_)) => {
                trace!("🤝 {:?} drain request coalesced into the ones already queued", reason);
                RequestStatus::Coalesced
            }
            Err(TrySendError::Closed(_)) => RequestStatus::Closed,
        }
    }

    /// 📸 Snapshot-and-clear under the lock. `None` when there is nothing to take.
    pub(crate) fn take_snapshot(&self) -> Option<Snapshot> {
        let mut guarded = self.lock();
        if guarded.buffer.is_empty() {
            return None;
        }
        let lines = guarded.buffer.snapshot_and_clear();
        let sequence = guarded.next_sequence;
        guarded.next_sequence += 1;
        Some(Snapshot { sequence, lines })
    }

    /// 🏁 Close the request queue. Triggers stop, workers finish what is queued.
    pub(crate) fn close(&self) {
        self.requests.close();
    }
}
