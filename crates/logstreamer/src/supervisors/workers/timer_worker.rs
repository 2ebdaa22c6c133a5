use anyhow::Result;
use tokio::task::JoinHandle;

use super::Worker;
use crate::triggers::TimerTrigger;

/// ⏱️ Puts the timer trigger on its own task so its cadence never waits on anyone.
pub(in crate::supervisors) struct TimerWorker {
    trigger: TimerTrigger,
}

impl TimerWorker {
    pub(in crate::supervisors) fn new(trigger: TimerTrigger) -> Self {
        Self { trigger }
    }
}

impl Worker for TimerWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            self.trigger.run().await;
            Ok(())
        })
    }
}
