//! 🎬 *[a drain request lands in the queue. somewhere, a worker wakes up.]*
//!
//! 🗑️ The DrainWorker module: patient, tireless, and deeply unbothered by the chaos
//! happening upstream. It receives drain requests. It takes a snapshot. It composes.
//! It ships. When the ship sinks, it writes it down and moves on. No retries, no
//! tears, no re-queueing. It is the most emotionally stable part of this codebase.
//!
//! 🧠 Knowledge graph:
//! - The snapshot is taken when the request is *served*, not when it was sent.
//!   A request that finds the buffer empty is a no-op: no compose, no network call.
//! - A snapshot belongs to exactly one worker, so it can never ship twice.
//! - Different workers ship different snapshots at the same time; the pool size is
//!   the ceiling on concurrent bulk requests.

use std::sync::Arc;

use anyhow::Result;
use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::Worker;
use crate::backends::elasticsearch::{count_item_errors, is_connection_error};
use crate::backends::{Sink, SinkBackend};
use crate::composers::BulkComposer;
use crate::coordinator::{DrainCoordinator, DrainReason, Snapshot};
use crate::stats::DrainStats;

/// 🧰 Everything needed to turn a snapshot into a shipped batch. One per worker,
/// plus one for the supervisor's final drain.
#[derive(Debug, Clone)]
pub(in crate::supervisors) struct Drainer {
    composer: BulkComposer,
    sink: SinkBackend,
    stats: Arc<DrainStats>,
    debug: bool,
}

impl Drainer {
    pub(in crate::supervisors) fn new(
        composer: BulkComposer,
        sink: SinkBackend,
        stats: Arc<DrainStats>,
        debug: bool,
    ) -> Self {
        Self {
            composer,
            sink,
            stats,
            debug,
        }
    }

    /// 🚿 Snapshot-and-clear, then compose and ship. An empty buffer costs a lock and
    /// a counter bump, nothing else.
    pub(in crate::supervisors) async fn drain(&mut self, coordinator: &DrainCoordinator) {
        match coordinator.take_snapshot() {
            Some(snapshot) => self.ship_snapshot(snapshot).await,
            None => {
                trace!("🕳️ Drain found an empty buffer, nothing to ship");
                self.stats.noop_drain();
            }
        }
    }

    async fn ship_snapshot(&mut self, snapshot: Snapshot) {
        debug!(
            "🚿 Draining batch #{} with {} lines",
            snapshot.sequence,
            snapshot.lines.len()
        );
        let payload = self.composer.compose(&snapshot.lines);
        // -- the lines are in the payload now; the snapshot has served its purpose
        drop(snapshot.lines);

        if payload.skipped() > 0 {
            self.stats.records_skipped(payload.skipped());
        }
        if payload.is_empty() {
            warn!(
                "⚠️ Batch #{}: every record failed to encode ({} skipped), nothing to ship",
                snapshot.sequence,
                payload.skipped()
            );
            return;
        }

        match self.sink.ship(&payload).await {
            Ok(outcome) => {
                self.stats
                    .batch_shipped(payload.records(), outcome.elapsed, outcome.success);
                if self.debug {
                    debug!("📬 Batch #{} response: {}", snapshot.sequence, outcome.response_body);
                }
                if !outcome.success {
                    error!(
                        "💀 Batch #{} ({} records) rejected by the bulk endpoint after {:?}. Dropped, no retry. Response: {}",
                        snapshot.sequence,
                        payload.records(),
                        outcome.elapsed,
                        outcome.response_body
                    );
                    return;
                }
                if let Some(failed_items) = count_item_errors(&outcome.response_body) {
                    self.stats.batch_had_item_errors();
                    warn!(
                        "⚠️ Batch #{} accepted, but {} of {} records were refused by the index",
                        snapshot.sequence,
                        failed_items,
                        payload.records()
                    );
                }
                info!(
                    "✅ Drain done: batch #{} shipped {} records in {:?}",
                    snapshot.sequence,
                    payload.records(),
                    outcome.elapsed
                );
            }
            Err(err) => {
                self.stats.batch_failed();
                if is_connection_error(&err) {
                    self.stats.connection_failed();
                }
                error!(
                    "💀 Batch #{} ({} records) failed to ship. Dropped, no retry: {:#}",
                    snapshot.sequence,
                    payload.records(),
                    err
                );
            }
        }
    }
}

/// 🗑️ Pulls drain requests off the queue until the queue is closed *and* empty.
pub(in crate::supervisors) struct DrainWorker {
    id: usize,
    requests: Receiver<DrainReason>,
    coordinator: Arc<DrainCoordinator>,
    drainer: Drainer,
}

impl DrainWorker {
    pub(in crate::supervisors) fn new(
        id: usize,
        requests: Receiver<DrainReason>,
        coordinator: Arc<DrainCoordinator>,
        drainer: Drainer,
    ) -> Self {
        Self {
            id,
            requests,
            coordinator,
            drainer,
        }
    }
}

impl Worker for DrainWorker {
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("📥 DrainWorker {} started", self.id);
            // -- async_channel keeps handing out queued requests after close; Err means closed AND empty
            while let Ok(reason) = self.requests.recv().await {
                trace!("🔔 DrainWorker {} serving a {:?} drain", self.id, reason);
                self.drainer.drain(&self.coordinator).await;
            }
            debug!("🏁 DrainWorker {}: request queue closed. Shutting down.", self.id);
            Ok(())
        })
    }
}
