//! 🔌 Backends: where the bytes finally leave the building.
//!
//! 🚰 A sink takes a fully composed bulk payload and ships it. One request, one
//! response, one stopwatch. Sinks do not buffer, do not compose, do not retry.
//! Like a postal worker who delivers the mail without reading it.
//! (Unlike your actual postal worker, Kevin.)
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::composers::BulkPayload;

pub(crate) mod elasticsearch;
#[cfg(test)]
pub(crate) mod in_mem;

pub(crate) use elasticsearch::ElasticsearchSink;
#[cfg(test)]
pub(crate) use in_mem::InMemorySink;

/// 📬 What came back from one drain. Consumed by logs and counters, then forgotten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DrainOutcome {
    pub response_body: String,
    pub elapsed: Duration,
    pub success: bool,
}

/// 🕳️ A sink that ships pre-composed payloads. Pure I/O, zero logic.
///
/// # Contract 📜
/// - `ship` performs exactly one write-and-read-response cycle and times it.
/// - `Err` means the transport failed: nothing came back.
/// - A response that came back unhappy is `Ok` with `success: false`.
/// - Whatever connection the request held is released before `ship` returns.
#[async_trait]
pub(crate) trait Sink: std::fmt::Debug + Send {
    async fn ship(&mut self, payload: &BulkPayload) -> Result<DrainOutcome>;
}

/// 🎭 The many faces of a Sink. Each drain worker owns its own clone.
#[derive(Debug, Clone)]
pub(crate) enum SinkBackend {
    Elasticsearch(ElasticsearchSink),
    #[cfg(test)]
    InMemory(InMemorySink),
}

#[async_trait]
impl Sink for SinkBackend {
    async fn ship(&mut self, payload: &BulkPayload) -> Result<DrainOutcome> {
        match self {
            SinkBackend::Elasticsearch(sink) => sink.ship(payload).await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.ship(payload).await,
        }
    }
}
