//! Output formatting and persistence for run summaries.
//!
//! Supports pretty-printing, a per-reason breakdown of dropped rows, JSON
//! serialization, and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::stats::RunSummary;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// One reason rows were dropped or patched during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscardLine {
    pub reason: &'static str,
    pub count: u64,
    /// Share of all stop_times rows, for reasons that apply to stop_times.
    pub pct_of_stop_times: Option<f64>,
}

/// Non-zero discard reasons, stop_times reasons first.
pub fn discard_breakdown(summary: &RunSummary) -> Vec<DiscardLine> {
    let stop_time_reasons = [
        ("unresolved_trip", summary.unresolved_trip),
        ("unresolved_stop", summary.unresolved_stop),
        ("bad_sequence", summary.bad_sequence),
    ];
    let other_reasons = [
        ("row_parse", summary.row_parse),
        ("routes_skipped", summary.routes_skipped),
        ("trips_skipped", summary.trips_skipped),
        ("stops_bad_coordinates", summary.stops_bad_coordinates),
        ("split_trips", summary.split_trips),
    ];

    let mut lines: Vec<DiscardLine> = stop_time_reasons
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(reason, count)| DiscardLine {
            reason,
            count,
            pct_of_stop_times: Some(RunSummary::pct(count, summary.stop_time_rows)),
        })
        .collect();
    lines.extend(
        other_reasons
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .map(|(reason, count)| DiscardLine {
                reason,
                count,
                pct_of_stop_times: None,
            }),
    );
    lines
}

/// One-line rendering of [`discard_breakdown`], e.g.
/// `unresolved_trip=2 (14.29%), row_parse=1`. `none` when nothing was dropped.
pub fn format_discards(summary: &RunSummary) -> String {
    let lines = discard_breakdown(summary);
    if lines.is_empty() {
        return "none".to_string();
    }
    lines
        .iter()
        .map(|l| match l.pct_of_stop_times {
            Some(pct) => format!("{}={} ({:.2}%)", l.reason, l.count, pct),
            None => format!("{}={}", l.reason, l.count),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Logs one line per discard reason, then the whole summary in Rust's debug
/// pretty-print format.
pub fn print_pretty(summary: &RunSummary) {
    for line in discard_breakdown(summary) {
        info!(
            reason = line.reason,
            count = line.count,
            pct_of_stop_times = %line
                .pct_of_stop_times
                .map(|p| format!("{p:.2}"))
                .unwrap_or_else(|| "-".to_string()),
            "Dropped rows"
        );
    }
    debug!("{:#?}", summary);
}

/// Logs the summary as pretty-printed JSON.
pub fn print_json(summary: &RunSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Appends a [`RunSummary`] as a row to a CSV history file.
///
/// Creates the file (and its parent directory) with headers if it does not
/// already exist.
pub fn append_record(path: impl AsRef<Path>, summary: &RunSummary) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}
