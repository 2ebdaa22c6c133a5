//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! - [`SourceWorker`]: reads lines, appends them, rings the size trigger.
//! - [`DrainWorker`]: answers drain requests, composes, ships.
//! - [`TimerWorker`]: rings the timer trigger.

use anyhow::Result;
use tokio::task::JoinHandle;

mod drain_worker;
mod source_worker;
mod timer_worker;

pub(in crate::supervisors) use drain_worker::{DrainWorker, Drainer};
pub(in crate::supervisors) use source_worker::SourceWorker;
pub(in crate::supervisors) use timer_worker::TimerWorker;

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust but verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
