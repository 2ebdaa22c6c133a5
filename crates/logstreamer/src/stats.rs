//! 📊 stats.rs: "Did my logs make it?" The question every on-call asks, every time, forever.
//!
//! Counters for everything the pipeline does, bumped with relaxed atomics from
//! whichever task happens to be doing the work. At shutdown the supervisor turns
//! them into a table so comfy it has lumbar support.
//!
//! ⚠️ Watching these numbers will not make the endpoint respond faster. Science says no.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};

/// 🔢 Formats a number with commas for the 3 people in the audience who like readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ Milliseconds with two decimals. Bulk requests live in the ms neighbourhood.
fn format_latency(duration: Duration) -> String {
    format!("{:.2} ms", duration.as_secs_f64() * 1000.0)
}

/// 📊 Process-wide delivery counters. Shared by `Arc`, bumped by everyone.
#[derive(Debug, Default)]
pub struct DrainStats {
    lines_ingested: AtomicU64,
    drain_requests: AtomicU64,
    drains_shipped: AtomicU64,
    noop_drains: AtomicU64,
    records_shipped: AtomicU64,
    records_skipped: AtomicU64,
    failed_batches: AtomicU64,
    connection_failures: AtomicU64,
    batches_with_item_errors: AtomicU64,
    ship_latency_micros: AtomicU64,
}

/// 📸 A plain-old-data copy of the counters at one moment.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub lines_ingested: u64,
    pub drain_requests: u64,
    pub drains_shipped: u64,
    pub noop_drains: u64,
    pub records_shipped: u64,
    pub records_skipped: u64,
    pub failed_batches: u64,
    pub connection_failures: u64,
    pub batches_with_item_errors: u64,
    pub ship_latency: Duration,
}

impl DrainStats {
    pub(crate) fn line_ingested(&self) {
        self.lines_ingested.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drain_requested(&self) {
        self.drain_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn noop_drain(&self) {
        self.noop_drains.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn records_skipped(&self, count: usize) {
        self.records_skipped.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// ✅ or 💀: either way the batch left the building and took this long doing it.
    pub(crate) fn batch_shipped(&self, records: usize, elapsed: Duration, success: bool) {
        self.drains_shipped.fetch_add(1, Ordering::Relaxed);
        self.ship_latency_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
        if success {
            self.records_shipped.fetch_add(records as u64, Ordering::Relaxed);
        } else {
            self.failed_batches.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 💀 Transport failure: no response, no latency worth averaging.
    pub(crate) fn batch_failed(&self) {
        self.drains_shipped.fetch_add(1, Ordering::Relaxed);
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// 🔌 Subset of `batch_failed`: the endpoint could not even be reached.
    pub(crate) fn connection_failed(&self) {
        self.connection_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_had_item_errors(&self) {
        self.batches_with_item_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            lines_ingested: self.lines_ingested.load(Ordering::Relaxed),
            drain_requests: self.drain_requests.load(Ordering::Relaxed),
            drains_shipped: self.drains_shipped.load(Ordering::Relaxed),
            noop_drains: self.noop_drains.load(Ordering::Relaxed),
            records_shipped: self.records_shipped.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            failed_batches: self.failed_batches.load(Ordering::Relaxed),
            connection_failures: self.connection_failures.load(Ordering::Relaxed),
            batches_with_item_errors: self.batches_with_item_errors.load(Ordering::Relaxed),
            ship_latency: Duration::from_micros(self.ship_latency_micros.load(Ordering::Relaxed)),
        }
    }
}

impl StatsSnapshot {
    /// ⏱️ Mean latency per shipped batch. Zero batches, zero drama.
    pub fn mean_ship_latency(&self) -> Duration {
        match u32::try_from(self.drains_shipped) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.ship_latency / n,
        }
    }

    /// 🍽️ Render the shutdown summary.
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["metric", "value"]);

        let rows = [
            ("lines ingested", format_number(self.lines_ingested)),
            ("drain requests", format_number(self.drain_requests)),
            ("batches shipped", format_number(self.drains_shipped)),
            ("no-op drains", format_number(self.noop_drains)),
            ("records shipped", format_number(self.records_shipped)),
            ("records skipped", format_number(self.records_skipped)),
            ("failed batches", format_number(self.failed_batches)),
            ("connection failures", format_number(self.connection_failures)),
            ("batches w/ item errors", format_number(self.batches_with_item_errors)),
            ("mean ship latency", format_latency(self.mean_ship_latency())),
        ];
        for (name, value) in rows {
            table.add_row(vec![
                Cell::new(name),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}
