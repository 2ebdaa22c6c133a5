//! 🔔 The Flush Trigger Set: two very different ways of saying "ship it".
//!
//! - ⏱️ [`TimerTrigger`]: the wall clock. Every interval, it asks for a drain.
//! - 📏 [`SizeTrigger`]: the bean counter. Too many lines since it last spoke up? Drain.
//!
//! Neither trigger waits for the drain it asked for. They ring the bell and walk away.
//! Whether the bell gets answered, coalesced, or ignored is the coordinator's business.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::coordinator::{DrainCoordinator, DrainReason, RequestStatus};

/// 📏 Counts appends and fires once the count goes *past* the limit.
///
/// The counter resets the moment it fires, not when the drain completes, so a
/// burst landing while that drain is in flight does not ring again for the same
/// backlog.
#[derive(Debug, Clone)]
pub(crate) struct SizeTrigger {
    max_items: Option<usize>,
    since_last_fire: usize,
}

impl SizeTrigger {
    /// `None` disables the trigger entirely.
    pub(crate) fn new(max_items: Option<usize>) -> Self {
        Self {
            max_items,
            since_last_fire: 0,
        }
    }

    /// ➕ Call after every append. `true` means: request a drain now.
    pub(crate) fn record_append(&mut self) -> bool {
        let Some(max_items) = self.max_items else {
            return false;
        };
        self.since_last_fire += 1;
        if self.since_last_fire > max_items {
            self.since_last_fire = 0;
            true
        } else {
            false
        }
    }
}

/// ⏱️ Rings every `interval`, forever, or until the coordinator closes shop.
#[derive(Debug, Clone)]
pub(crate) struct TimerTrigger {
    interval: Duration,
    coordinator: Arc<DrainCoordinator>,
}

impl TimerTrigger {
    pub(crate) fn new(interval: Duration, coordinator: Arc<DrainCoordinator>) -> Self {
        Self {
            interval,
            coordinator,
        }
    }

    /// 🔄 The tick loop. First tick lands one full interval after start. A slow
    /// runtime delays ticks instead of bursting to catch up.
    pub(crate) async fn run(self) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match self.coordinator.request_drain(DrainReason::Timer) {
                RequestStatus::Closed => {
                    debug!("⏱️ Timer trigger: coordinator closed, clocking out");
                    return;
                }
                status => trace!("⏱️ Timer trigger fired: {:?}", status),
            }
        }
    }
}
