//! 🚀 logstreamer: pipe your logs in, get bulk requests out.
//!
//! Lines arrive on stdin, wait in a buffer, and leave in batches for a `_bulk`
//! endpoint whenever the timer rings or the batch gets too big. Whichever comes first.

pub mod app_config;
pub mod common;
pub mod composers;
pub mod sources;
pub mod stats;

mod backends;
mod buffer;
mod coordinator;
mod supervisors;
mod triggers;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, BufReader};

use crate::app_config::AppConfig;
use crate::backends::{ElasticsearchSink, SinkBackend};
use crate::stats::StatsSnapshot;
use crate::supervisors::Supervisor;

/// 🚀 Ship stdin until it closes.
pub async fn run(app_config: AppConfig) -> Result<StatsSnapshot> {
    run_from(app_config, BufReader::new(tokio::io::stdin())).await
}

/// 🚀 Ship any line stream until it closes. `run` with the stdin part unplugged.
pub async fn run_from<R>(app_config: AppConfig, reader: R) -> Result<StatsSnapshot>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let sink = SinkBackend::Elasticsearch(
        ElasticsearchSink::new(&app_config.sink).context("Failed to build the Elasticsearch sink")?,
    );
    Supervisor::new(app_config)
        .run(reader, sink)
        .await
        .context("Failed to run the pipeline")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::{ElasticsearchSinkConfig, RuntimeConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn the_one_where_lines_travel_all_the_way_to_the_bulk_endpoint() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errors":false,"items":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let app_config = AppConfig {
            sink: ElasticsearchSinkConfig {
                url: format!("{}/", server.uri()),
                token: "e2e-token".into(),
                ..Default::default()
            },
            runtime: RuntimeConfig {
                poll_interval_ms: 0,
                max_items: 0,
                ..Default::default()
            },
            debug: true,
        };
        let input: &'static [u8] = b"hello\nworld\n";
        let stats = run_from(app_config, input).await?;

        assert_eq!(stats.lines_ingested, 2);
        assert_eq!(stats.records_shipped, 2);

        let received = server.received_requests().await.unwrap_or_default();
        assert_eq!(received.len(), 1);
        let body = String::from_utf8(received[0].body.clone())?;
        let records: Vec<&str> = body.lines().collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], r#"{"index":{"_index":"e2e-token","_type":"logstreamer"}}"#);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_an_unreachable_endpoint_still_exits_cleanly() -> Result<()> {
        let the_ghost_town = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            format!("http://{}", listener.local_addr()?)
        };
        let app_config = AppConfig {
            sink: ElasticsearchSinkConfig {
                url: the_ghost_town,
                ..Default::default()
            },
            runtime: RuntimeConfig {
                poll_interval_ms: 0,
                max_items: 1,
                ..Default::default()
            },
            debug: false,
        };
        let input: &'static [u8] = b"a\nb\nc\n";
        let stats = run_from(app_config, input).await?;

        assert_eq!(stats.records_shipped, 0);
        assert!(stats.failed_batches >= 1, "failures are counted, not fatal");
        assert_eq!(
            stats.connection_failures, stats.failed_batches,
            "every one of them failed at the connect, so the shutdown hint fires"
        );
        Ok(())
    }
}
