//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor wires the pipeline together and owns its lifecycle:
//!
//! ```text
//!   SourceWorker ──append──▶ DrainCoordinator ◀──request── TimerWorker
//!        │ size trigger          │  (buffer + request queue)
//!        └──────request──────────┤
//!                                ▼
//!                     DrainWorker × N ──▶ BulkComposer ──▶ Sink
//! ```
//!
//! Shutdown choreography, once the source runs dry:
//! 1. close the request queue and send the timer home,
//! 2. let the drain workers finish whatever was already queued,
//! 3. one final drain for the stragglers,
//! 4. print the receipts.
//!
//! ⚠️ The workers are the supervisor's private little minions. They stay private.

mod workers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app_config::AppConfig;
use crate::backends::SinkBackend;
use crate::composers::BulkComposer;
use crate::coordinator::DrainCoordinator;
use crate::sources::LineSource;
use crate::stats::{DrainStats, StatsSnapshot};
use crate::triggers::{SizeTrigger, TimerTrigger};
use workers::{DrainWorker, Drainer, SourceWorker, TimerWorker, Worker};

/// 📦 The Supervisor: holds the config, hands each component the slice it needs.
pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🚀 Run the pipeline until `reader` hits end-of-stream, then flush and report.
    ///
    /// Delivery failures never end up here; they are logged and counted by the drain
    /// workers. What does end up here: a broken input stream or a panicked worker,
    /// and both are reported only *after* the final drain had its chance.
    pub(crate) async fn run<R>(&self, reader: R, sink: SinkBackend) -> Result<StatsSnapshot>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        let runtime = &self.app_config.runtime;
        let routing = self.app_config.sink.routing();
        let debug_mode = self.app_config.debug;

        let stats = Arc::new(DrainStats::default());
        let composer = BulkComposer::new(&routing)
            .context("💀 Could not build the bulk composer from the sink config")?;
        let (coordinator, requests) =
            DrainCoordinator::new(runtime.pending_drain_requests(), stats.clone());
        let mut drainer = Drainer::new(composer, sink, stats.clone(), debug_mode);

        info!(
            "👀 Watch started: shipping to {} (index '{}', type '{}'), timer {:?}, size limit {:?}, {} drain workers",
            routing.url,
            routing.token,
            routing.log_type,
            runtime.poll_interval(),
            runtime.max_items(),
            runtime.drain_workers()
        );

        let drain_handles: Vec<_> = (0..runtime.drain_workers())
            .map(|id| {
                DrainWorker::new(id, requests.clone(), coordinator.clone(), drainer.clone()).start()
            })
            .collect();
        drop(requests);

        let timer_handle = runtime.poll_interval().map(|interval| {
            TimerWorker::new(TimerTrigger::new(interval, coordinator.clone())).start()
        });

        let source_result = SourceWorker::new(
            LineSource::new(reader),
            coordinator.clone(),
            SizeTrigger::new(runtime.max_items()),
            debug_mode,
        )
        .start()
        .await
        .context("💀 SourceWorker panicked")
        .and_then(|result| result);

        let worker_result = shut_down(&coordinator, drain_handles, timer_handle, &mut drainer).await;

        let snapshot = stats.snapshot();
        info!("📊 Delivery summary:\n{}", snapshot.summary_table());
        if snapshot.connection_failures > 0 {
            warn!(
                "🔧 hint: {} batches never reached {}. Double-check the --url, and that the service behind it is actually running. ☕",
                snapshot.connection_failures,
                routing.url
            );
        }

        source_result?;
        worker_result?;
        Ok(snapshot)
    }
}

/// 🏁 Everything after end-of-stream, up to and including the final drain.
///
/// Worker failures are collected, never returned early: the final drain runs
/// no matter who crashed on the way out.
async fn shut_down(
    coordinator: &DrainCoordinator,
    drain_handles: Vec<JoinHandle<Result<()>>>,
    timer_handle: Option<JoinHandle<Result<()>>>,
    drainer: &mut Drainer,
) -> Result<()> {
    // 🏁 no more requests: the timer clocks out, the workers finish the queue
    coordinator.close();
    let mut worker_result: Result<()> = Ok(());
    for joined in futures::future::join_all(drain_handles).await {
        if let Err(err) = joined.context("💀 DrainWorker panicked").and_then(|result| result) {
            error!("💀 {:#}", err);
            worker_result = worker_result.and(Err(err));
        }
    }
    // ⏱️ the timer would notice the closed queue on its next tick, which could be
    // a whole interval away. nobody wants to wait 10s to exit.
    if let Some(timer_handle) = timer_handle {
        timer_handle.abort();
        match timer_handle.await {
            Err(join_err) if join_err.is_cancelled() => {}
            joined => {
                if let Err(err) = joined.context("💀 TimerWorker panicked").and_then(|result| result) {
                    error!("💀 {:#}", err);
                    worker_result = worker_result.and(Err(err));
                }
            }
        }
    }

    // 🧹 final drain: whatever arrived after the last request gets one shot
    let leftover = coordinator.buffered();
    if leftover > 0 {
        info!("🧹 Input closed, final drain of {} buffered lines", leftover);
    } else {
        debug!("🧹 Input closed, buffer already empty");
    }
    drainer.drain(coordinator).await;
    worker_result
}
