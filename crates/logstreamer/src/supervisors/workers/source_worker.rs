//! 🚰 The SourceWorker: reads, appends, counts. Never waits on the network.
//!
//! The only thing this worker ever awaits is the next line. Appending takes a
//! mutex for a `Vec::push`; ringing the size trigger is a `try_send`. A slow
//! endpoint can ruin the drain workers' day, but it cannot touch this loop.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::coordinator::{DrainCoordinator, DrainReason, RequestStatus};
use crate::sources::LineSource;
use crate::triggers::SizeTrigger;

pub(in crate::supervisors) struct SourceWorker<R> {
    source: LineSource<R>,
    coordinator: Arc<DrainCoordinator>,
    size_trigger: SizeTrigger,
    debug: bool,
}

impl<R> SourceWorker<R> {
    pub(in crate::supervisors) fn new(
        source: LineSource<R>,
        coordinator: Arc<DrainCoordinator>,
        size_trigger: SizeTrigger,
        debug: bool,
    ) -> Self {
        Self {
            source,
            coordinator,
            size_trigger,
            debug,
        }
    }
}

impl<R> Worker for SourceWorker<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn start(mut self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            debug!("🚰 SourceWorker started reading...");
            let mut index: u64 = 0;
            while let Some(line) = self
                .source
                .next_line()
                .await
                .context("SourceWorker failed to read the next line")?
            {
                if self.debug {
                    debug!("{} : {}", index, String::from_utf8_lossy(line.as_bytes()));
                }
                index += 1;

                self.coordinator.append(line);
                if self.size_trigger.record_append() {
                    debug!("📏 Drain limit reached, draining..");
                    if self.coordinator.request_drain(DrainReason::SizeLimit) == RequestStatus::Closed {
                        debug!("🏁 SourceWorker: coordinator closed underneath us");
                    }
                }
            }
            debug!("🏁 SourceWorker: end of stream after {} lines", index);
            Ok(())
        })
    }
}
