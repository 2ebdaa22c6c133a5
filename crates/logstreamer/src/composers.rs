//! 🎼 The Composers module: turning a pile of raw lines into a `_bulk` payload.
//!
//! 🎬 *[the buffer has been drained. the snapshot awaits. the endpoint hungers.]*
//!
//! The bulk API has rules. Rule 1: one directive line naming the index and type.
//! Rule 2: one document per line after that. Rule 3: newline-delimited, trailing
//! newline included. Three engineers lost weekends to Rule 3. Their families miss them.
//!
//! ```text
//! {"index":{"_index":"<token>","_type":"<log_type>"}}\n
//! {"Level":"","Message":{"Text":"line 1",...},...}\n
//! {"Level":"","Message":{"Text":"line 2",...},...}\n
//! ```
//!
//! 🧠 Composing never fails. A line that refuses to become JSON gets skipped and
//! counted; its neighbours ship without it. One bad apple does not cancel the pie.

use anyhow::{Context, Result};
use tracing::warn;

use crate::common::{BulkAction, BulkActionDescription, LogLine, LogMessage, RoutingMetadata};

/// 📦 A ready-to-ship NDJSON body plus the bookkeeping of how it got that way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPayload {
    body: String,
    records: usize,
    skipped: usize,
}

impl BulkPayload {
    /// 📜 The full NDJSON body, directive first, trailing newline included.
    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// 📄 Data records in the body. The directive does not count.
    pub fn records(&self) -> usize {
        self.records
    }

    /// 🗑️ Lines that could not be encoded and were left out.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// 🕳️ A payload with a directive and nothing to direct.
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}

/// 🎼 Builds bulk payloads for one destination.
///
/// The routing directive never changes for the lifetime of the process, so it is
/// serialized once here and copied into every payload.
#[derive(Debug, Clone)]
pub struct BulkComposer {
    directive: String,
}

impl BulkComposer {
    /// 🏗️ Serialize the directive up front. If this fails, the config is cursed and
    /// we would rather know at startup than on the first drain.
    pub fn new(routing: &RoutingMetadata) -> Result<Self> {
        let directive = serde_json::to_string(&BulkAction {
            index: BulkActionDescription {
                index: &routing.token,
                doc_type: &routing.log_type,
            },
        })
        .context("💀 The routing directive refused to become JSON. The index token or log type is doing something JSON cannot express.")?;
        Ok(Self { directive })
    }

    /// 🎼 Compose a snapshot into a payload. Total: always returns *something*.
    pub fn compose(&self, lines: &[LogLine]) -> BulkPayload {
        // 🧮 Pre-allocate: every document carries ~150 bytes of blank schema fields.
        let estimated_size = self.directive.len()
            + 1
            + lines.iter().map(|line| line.len() + 160).sum::<usize>();
        let mut body = String::with_capacity(estimated_size);
        body.push_str(&self.directive);
        body.push('\n');

        let mut records = 0usize;
        let mut skipped = 0usize;
        for (position, line) in lines.iter().enumerate() {
            match encode_line(line) {
                Ok(document) => {
                    body.push_str(&document);
                    body.push('\n');
                    records += 1;
                }
                Err(err) => {
                    // -- 🗑️ skip this one record, keep the rest of the batch alive
                    warn!(
                        "⚠️ Skipping record {} of {} ({} bytes): {:#}",
                        position,
                        lines.len(),
                        line.len(),
                        err
                    );
                    skipped += 1;
                }
            }
        }

        BulkPayload {
            body,
            records,
            skipped,
        }
    }
}

/// 🔄 One line → one document string.
fn encode_line(line: &LogLine) -> Result<String> {
    let text = line
        .as_text()
        .context("💀 Line is not valid UTF-8. JSON strings are UTF-8 by law.")?;
    serde_json::to_string(&LogMessage::wrapping(text))
        .context("💀 Failed to serialize the log document")
}
