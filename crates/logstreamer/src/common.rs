//! 📦 Common data structures: the building blocks of logstreamer
//!
//! 🎬 COLD OPEN. INT. SOMEONE'S TERMINAL. 3:47 AM
//!
//! A process is piping its logs into us. It does not know where they go.
//! It does not care. It just prints, line after line, like a diary nobody asked for.
//! We catch every line. We wrap it. We ship it to the index in the sky.
//!
//! This module holds the humble structs that ferry those lines around:
//! the [`LogLine`] (one line, raw bytes, zero opinions), the [`RoutingMetadata`]
//! (where the lines are going), and the wire schema the bulk endpoint expects.
//!
//! 🦆

use serde::Serialize;

/// 🎯 One line of input. The atomic unit of ingestion.
///
/// Holds the raw bytes of the line with its terminator (`\n` or `\r\n`) removed.
/// Bytes, not `String`, because stdin does not promise UTF-8 and we refuse to
/// lie about it at the door. Whether the bytes are text is the composer's
/// problem, later, when it actually matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine(Vec<u8>);

impl LogLine {
    /// 🏗️ Wrap raw bytes. Trailing `\n` / `\r\n` are stripped, everything else stays.
    pub fn new(mut raw: Vec<u8>) -> Self {
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }
        Self(raw)
    }

    /// 📖 The raw bytes, exactly as they came off the pipe.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// 🔤 The line as text, if it is text. Invalid UTF-8 → `Err`.
    pub fn as_text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for LogLine {
    fn from(line: &str) -> Self {
        Self::new(line.as_bytes().to_vec())
    }
}

impl From<String> for LogLine {
    fn from(line: String) -> Self {
        Self::new(line.into_bytes())
    }
}

/// 📡 Where the lines are going. Set once at startup, read-only forever after.
///
/// The `token` doubles as the index name (Logsene-style: your token IS your index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingMetadata {
    pub url: String,
    pub token: String,
    pub log_type: String,
}

// ============================================================
//  📤 Wire schema. Field names are dictated by the remote index
//  mapping, hence the PascalCase renames.
// ============================================================

/// 📜 The routing directive, first line of every bulk payload:
/// `{"index":{"_index":"<token>","_type":"<log_type>"}}`
#[derive(Debug, Serialize)]
pub(crate) struct BulkAction<'a> {
    pub index: BulkActionDescription<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BulkActionDescription<'a> {
    #[serde(rename = "_index")]
    pub index: &'a str,
    #[serde(rename = "_type")]
    pub doc_type: &'a str,
}

/// 📦 One document per log line. Only `Message.Text` carries data; everything else
/// is shipped blank because nobody upstream ever told us the level, the host or the
/// time. The index mapping expects the fields anyway, so blank they stay.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LogMessage<'a> {
    pub level: &'a str,
    pub message: Message<'a>,
    pub received: &'a str,
    pub time: &'a str,
    pub host: &'a str,
    pub environment: &'a str,
    #[serde(rename = "CorrelationID")]
    pub correlation_id: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Message<'a> {
    pub text: &'a str,
    pub exception: &'a str,
    #[serde(rename = "Custom1")]
    pub custom1: &'a str,
    #[serde(rename = "Custom2")]
    pub custom2: &'a str,
    #[serde(rename = "Custom3")]
    pub custom3: &'a str,
    #[serde(rename = "Custom4")]
    pub custom4: &'a str,
}

impl<'a> LogMessage<'a> {
    /// 🎁 Gift-wrap a line of text into the document schema. Everything else: blank.
    pub(crate) fn wrapping(text: &'a str) -> Self {
        Self {
            message: Message {
                text,
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
