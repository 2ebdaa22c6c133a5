use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use serde::Deserialize;
use tracing::{debug, trace};

use crate::app_config::ElasticsearchSinkConfig;
use crate::backends::{DrainOutcome, Sink};
use crate::composers::BulkPayload;

/// 📡 The production sink: POSTs NDJSON to `<url>/_bulk`.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪, connection-pooled and shared by every clone
/// - `bulk_url`: computed once, because string formatting per request is a hobby, not a job
/// - `compression`: gzip the body or send it naked
///
/// Knock knock. Who's there? HTTP POST. HTTP POST who? HTTP POST your NDJSON
/// and hope the cluster's in a good mood.
#[derive(Debug, Clone)]
pub(crate) struct ElasticsearchSink {
    client: reqwest::Client,
    bulk_url: String,
    compression: bool,
}

impl ElasticsearchSink {
    /// 🚀 Build the client. No connectivity ping: a log shipper that refuses to start
    /// because the endpoint blinked would lose the very logs explaining why.
    pub(crate) fn new(config: &ElasticsearchSinkConfig) -> Result<Self> {
        // 🔧 10 second connect timeout because if the endpoint can't handshake in 10
        // seconds, it's not having a good time and neither are we.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. Probably a missing cert store or a cursed system OpenSSL.")?;

        // -- One slash of difference. Infinite suffering of difference.
        let bulk_url = format!("{}/_bulk", config.url.trim_end_matches('/'));

        Ok(Self {
            client,
            bulk_url,
            compression: config.compression,
        })
    }

    fn gzip(body: &str) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(body.len() / 4), Compression::default());
        encoder
            .write_all(body.as_bytes())
            .context("💀 gzip choked on the payload")?;
        encoder.finish().context("💀 gzip could not finish the payload")
    }
}

#[async_trait]
impl Sink for ElasticsearchSink {
    /// 📡 One POST, one response, one stopwatch. No retry, that's a feature.
    async fn ship(&mut self, payload: &BulkPayload) -> Result<DrainOutcome> {
        debug!(
            "📡 Sending {} bytes ({} records) to {}",
            payload.body().len(),
            payload.records(),
            self.bulk_url
        );

        // ⚠️ application/x-ndjson, not application/json. The bulk API cares. Deeply.
        let request = self
            .client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson");
        let request = if self.compression {
            request
                .header(CONTENT_ENCODING, "gzip")
                .body(Self::gzip(payload.body())?)
        } else {
            request.body(payload.body().to_owned())
        };

        let started = Instant::now();
        let response = request
            .send()
            .await
            .context("💀 The bulk request never made it. We launched the payload into the network and the network responded with 'not vibing with it.' Check connectivity, check timeouts, check your feelings.")?;
        let status = response.status();
        // 🗑️ reading the body to the end hands the connection back to the pool, happy or sad
        let response_body = response
            .text()
            .await
            .context("💀 The endpoint answered, then trailed off mid-sentence. Could not read the bulk response body.")?;
        let elapsed = started.elapsed();

        trace!("🚀 Bulk request answered with {} in {:?}", status, elapsed);
        Ok(DrainOutcome {
            response_body,
            elapsed,
            success: status.is_success(),
        })
    }
}

/// 🔍 The parts of a bulk response we care about when we bother to look.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// 🔍 Count the per-item failures inside a bulk response body.
///
/// `None` when the body is not a bulk response (or claims no errors). The batch
/// is not retried either way; this exists so the logs can say *how* sad it was.
pub(crate) fn count_item_errors(response_body: &str) -> Option<usize> {
    let parsed: BulkResponse = serde_json::from_str(response_body).ok()?;
    if !parsed.errors {
        return None;
    }
    let failed = parsed
        .items
        .iter()
        .filter(|item| item.values().any(|result| result.get("error").is_some()))
        .count();
    Some(failed)
}

/// 🔌 Did this ship fail because the endpoint could not be reached at all?
///
/// Walks the context chain looking for the reqwest error underneath. A refused,
/// reset or timed-out connect counts; a 500 never gets here, it is an `Ok`.
pub(crate) fn is_connection_error(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<reqwest::Error>())
        .any(|reqwest_err| reqwest_err.is_connect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{LogLine, RoutingMetadata};
    use crate::composers::BulkComposer;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink_config(url: String, compression: bool) -> ElasticsearchSinkConfig {
        ElasticsearchSinkConfig {
            url,
            token: "tok".into(),
            compression,
            ..Default::default()
        }
    }

    fn payload_of(lines: &[&str]) -> Result<BulkPayload> {
        let composer = BulkComposer::new(&RoutingMetadata {
            url: String::new(),
            token: "tok".into(),
            log_type: "logstreamer".into(),
        })?;
        let lines: Vec<LogLine> = lines.iter().copied().map(LogLine::from).collect();
        Ok(composer.compose(&lines))
    }

    #[tokio::test]
    async fn the_one_where_the_payload_lands_on_bulk_with_the_right_content_type() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("content-type", "application/x-ndjson"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errors":false,"items":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        // 🧪 trailing slash on purpose: `/_bulk`, not `//_bulk`
        let mut sink = ElasticsearchSink::new(&sink_config(format!("{}/", server.uri()), false))?;
        let payload = payload_of(&["one", "two"])?;
        let outcome = sink.ship(&payload).await?;

        assert!(outcome.success);
        assert_eq!(outcome.response_body, r#"{"errors":false,"items":[]}"#);

        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 1);
        assert_eq!(String::from_utf8(received[0].body.clone())?, payload.body());
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_500_is_an_unhappy_outcome_not_an_error() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(500).set_body_string("shard on fire"))
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(&sink_config(server.uri(), false))?;
        let outcome = sink.ship(&payload_of(&["doomed"])?).await?;

        assert!(!outcome.success);
        assert_eq!(outcome.response_body, "shard on fire");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_listening() -> Result<()> {
        // 🧪 bind a port, remember it, then let the listener drop. Port is now a ghost town.
        let the_ghost_town = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            format!("http://{}", listener.local_addr()?)
        };
        let mut sink = ElasticsearchSink::new(&sink_config(the_ghost_town, false))?;
        let err = sink
            .ship(&payload_of(&["hello?"])?)
            .await
            .expect_err("a refused connection is a transport error");
        assert!(is_connection_error(&err), "and it is recognised as a connection problem: {err:#}");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_compression_squishes_the_bytes() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .and(header("content-encoding", "gzip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = ElasticsearchSink::new(&sink_config(server.uri(), true))?;
        let payload = payload_of(&["squish me"])?;
        assert!(sink.ship(&payload).await?.success);

        let received = server.received_requests().await.unwrap_or_default();
        let mut unsquished = String::new();
        GzDecoder::new(received[0].body.as_slice()).read_to_string(&mut unsquished)?;
        assert_eq!(unsquished, payload.body());
        Ok(())
    }

    #[test]
    fn the_one_where_item_errors_get_counted() {
        let body = r#"{"took":3,"errors":true,"items":[
            {"index":{"status":201}},
            {"index":{"status":400,"error":{"type":"mapper_parsing_exception"}}},
            {"index":{"status":429,"error":{"type":"es_rejected_execution_exception"}}}
        ]}"#;
        assert_eq!(count_item_errors(body), Some(2));
        assert_eq!(count_item_errors(r#"{"errors":false,"items":[]}"#), None);
        assert_eq!(count_item_errors("not json at all"), None);
    }

    #[test]
    fn the_one_where_not_every_sadness_is_a_connection_problem() {
        let err = anyhow::anyhow!("gzip choked").context("💀 The bulk request never made it.");
        assert!(!is_connection_error(&err));
    }
}
