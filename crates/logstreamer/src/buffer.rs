//! 🪣 The Batch Buffer: where log lines wait in line. Literally.
//!
//! Lines go in at the tail. A drain takes all of them at once and leaves the
//! buffer empty. That's the whole job. The buffer itself has no lock: it lives
//! inside the [`DrainCoordinator`](crate::coordinator::DrainCoordinator), which
//! owns the only mutex that guards it. One buffer, one lock, zero races.

use crate::common::LogLine;

/// 🪣 Ordered, unbounded collection of lines nobody has shipped yet.
#[derive(Debug, Default)]
pub(crate) struct BatchBuffer {
    lines: Vec<LogLine>,
}

impl BatchBuffer {
    /// ➕ Tail append. Returns the buffer length after the push.
    #[inline]
    pub(crate) fn append(&mut self, line: LogLine) -> usize {
        self.lines.push(line);
        self.lines.len()
    }

    /// 📸 Hand over everything, in append order, and start fresh.
    ///
    /// `mem::take` swaps in an empty Vec: no copy, no partial state.
    pub(crate) fn snapshot_and_clear(&mut self) -> Vec<LogLine> {
        std::mem::take(&mut self.lines)
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
