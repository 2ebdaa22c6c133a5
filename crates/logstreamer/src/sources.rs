//! 🚰 The Line Source: where log lines are born (well, where they arrive, anyway).
//!
//! Reads newline-terminated records off any async byte stream. In production that
//! stream is stdin; in tests it is whatever in-memory pipe the test feels like.
//! No parsing, no validation, no UTF-8 checks. Bytes in, [`LogLine`]s out.

#[cfg(not(unix))]
use std::io::IsTerminal;
#[cfg(unix)]
use std::os::fd::AsFd;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::common::LogLine;

/// 🚰 Hands out one line at a time until the stream runs dry.
#[derive(Debug)]
pub struct LineSource<R> {
    reader: R,
    // ⚠️ reused between reads: one allocation per line, not two
    scratch: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            scratch: Vec::with_capacity(4 * 1024),
        }
    }

    /// 📖 Next line, or `None` at end-of-stream. A final line without a trailing
    /// newline still counts: it was written, so it gets shipped.
    pub async fn next_line(&mut self) -> Result<Option<LogLine>> {
        self.scratch.clear();
        let bytes_read = self
            .reader
            .read_until(b'\n', &mut self.scratch)
            .await
            .context("💀 The input stream broke mid-read. The pipe went quiet in the rudest way possible.")?;
        if bytes_read == 0 {
            return Ok(None);
        }
        Ok(Some(LogLine::new(self.scratch.clone())))
    }
}

/// 🔒 Refuse to run unless stdin is a pipe. A terminal means nobody is piping logs in;
/// a regular file or `/dev/null` is not a live stream either.
pub fn ensure_stdin_is_piped() -> Result<()> {
    ensure_piped(&std::io::stdin())
}

#[cfg(unix)]
fn ensure_piped(input: &impl AsFd) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    let handle = std::fs::File::from(
        input
            .as_fd()
            .try_clone_to_owned()
            .context("💀 Could not borrow stdin long enough to look at it")?,
    );
    let metadata = handle
        .metadata()
        .context("💀 Could not stat stdin. It exists, but it won't say what it is.")?;
    if !metadata.file_type().is_fifo() {
        anyhow::bail!(
            "💀 must be used with a pipe :( stdin is not one. Try: `your-app | logstreamer --token <token>`"
        );
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_piped(input: &impl IsTerminal) -> Result<()> {
    if input.is_terminal() {
        anyhow::bail!(
            "💀 must be used with a pipe :( stdin is a terminal. Try: `your-app | logstreamer --token <token>`"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_every_line_comes_out_in_order() -> Result<()> {
        let input: &[u8] = b"first\nsecond\r\n\nlast-without-newline";
        let mut source = LineSource::new(input);

        let mut lines = Vec::new();
        while let Some(line) = source.next_line().await? {
            lines.push(line);
        }

        assert_eq!(
            lines,
            vec![
                LogLine::from("first"),
                LogLine::from("second"),
                LogLine::from(""),
                LogLine::from("last-without-newline"),
            ]
        );
        assert!(source.next_line().await?.is_none(), "end-of-stream is terminal");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_invalid_utf8_gets_through_the_door() -> Result<()> {
        let input: &[u8] = &[0xff, 0xfe, b'\n'];
        let mut source = LineSource::new(input);
        let line = source.next_line().await?.expect("one line");
        assert_eq!(line.as_bytes(), &[0xff, 0xfe]);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn the_one_where_only_a_real_pipe_gets_in() -> Result<()> {
        let (the_pipe, _the_other_end) = std::io::pipe()?;
        ensure_piped(&the_pipe)?;

        let the_file = tempfile::tempfile()?;
        let err = ensure_piped(&the_file).expect_err("a regular file is not a pipe");
        assert!(err.to_string().contains("must be used with a pipe"));

        let the_void = std::fs::File::open("/dev/null")?;
        assert!(ensure_piped(&the_void).is_err(), "/dev/null is not a pipe either");
        Ok(())
    }
}
