use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{DrainOutcome, Sink};
use crate::composers::BulkPayload;

/// 📦 A sink that never forgets. Test builds only.
///
/// Every payload it is asked to ship gets stashed in a shared Vec, so a test can
/// count "network calls" and peek at what would have gone over the wire.
/// Clone-able because every drain worker owns its own copy of the sink; the `Arc`
/// means they all hoard into the same Vec.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemorySink {
    pub(crate) received: Arc<Mutex<Vec<BulkPayload>>>,
    fail: bool,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 💀 A sink that records the payload and then reports a 503, every time.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) async fn payloads(&self) -> Vec<BulkPayload> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Sink for InMemorySink {
    async fn ship(&mut self, payload: &BulkPayload) -> Result<DrainOutcome> {
        self.received.lock().await.push(payload.clone());
        Ok(DrainOutcome {
            response_body: if self.fail {
                "service unavailable".to_string()
            } else {
                r#"{"errors":false,"items":[]}"#.to_string()
            },
            elapsed: Duration::from_millis(1),
            success: !self.fail,
        })
    }
}
