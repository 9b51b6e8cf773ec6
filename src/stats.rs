use chrono::{DateTime, Utc};
use serde::Serialize;

/// Per-run counters, logged as the final summary and optionally appended to
/// a CSV history.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: DateTime<Utc>,
    pub feed_dir: String,

    // entities
    pub routes: usize,
    pub stops: usize,
    pub trips: usize,
    pub routes_skipped: u64,
    pub trips_skipped: u64,
    pub stops_bad_coordinates: u64,

    // stop_times
    pub stop_time_rows: u64,
    pub chunks: u64,
    pub unresolved_trip: u64,
    pub unresolved_stop: u64,
    pub bad_sequence: u64,
    pub row_parse: u64,
    pub split_trips: u64,

    // derived
    pub directions: usize,
    pub variant_stops: usize,
    pub station_groups: usize,
    pub routes_without_directions: usize,
    pub stops_without_routes: usize,

    // optional tables
    pub agencies: usize,
    pub calendar_services: usize,
    pub shape_rows: usize,

    pub elapsed_ms: i64,
}

impl RunSummary {
    pub fn new(feed_dir: &str) -> Self {
        RunSummary {
            timestamp: Utc::now(),
            feed_dir: feed_dir.to_string(),
            ..Default::default()
        }
    }

    /// Rows dropped because they referenced an unknown trip or stop, or had
    /// a non-integer sequence number.
    pub fn discarded_stop_times(&self) -> u64 {
        self.unresolved_trip + self.unresolved_stop + self.bad_sequence
    }

    /// Every recovered row-level problem across all tables.
    pub fn recovered_rows(&self) -> u64 {
        self.discarded_stop_times() + self.row_parse + self.routes_skipped + self.trips_skipped
    }

    pub fn pct(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn discard_pct(&self) -> f64 {
        Self::pct(self.discarded_stop_times(), self.stop_time_rows)
    }
}
