//! Stop-time aggregation.
//!
//! Rows arrive in batches from the chunked loader. Each row is resolved
//! against the trip and stop maps, recorded on the stop's served-by map and
//! appended to a per-trip accumulator. Accumulated trips are handed to the
//! direction resolver either after every batch or once at end of stream,
//! depending on [`FlushPolicy`]. Raw rows never outlive their batch.
//!
//! Rows of one trip need not be contiguous. Under per-batch flushing a trip
//! that shows up again after being resolved is merged with its earlier calls
//! and offered once more, keeping its first-seen rank for tie-breaks, so
//! both policies produce the same directions.

pub mod directions;

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::config::FlushPolicy;
use crate::error::{GtfsError, ReferenceKind};
use crate::loader::records::{GtfsRecord, StopTimeRecord};
use crate::model::{DirectionId, RouteId, StopId, TransitModel, TripId};
pub use directions::{Resolution, TieBreak, resolve_trip, resolve_trip_with};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateCounters {
    pub rows: u64,
    pub unresolved_trip: u64,
    pub unresolved_stop: u64,
    pub bad_sequence: u64,
    /// Trips whose rows reappeared after they had already been flushed.
    pub split_trips: u64,
    pub created: u64,
    pub replaced: u64,
    pub tied: u64,
    pub shorter: u64,
}

impl AggregateCounters {
    pub fn discarded(&self) -> u64 {
        self.unresolved_trip + self.unresolved_stop + self.bad_sequence
    }

    fn record(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Created => self.created += 1,
            Resolution::Replaced => self.replaced += 1,
            Resolution::Tied => self.tied += 1,
            Resolution::Shorter => self.shorter += 1,
            Resolution::Empty | Resolution::UnknownRoute => {}
        }
    }
}

struct PendingTrip {
    trip_id: TripId,
    /// Order of first appearance in the stream.
    rank: u64,
    stop_times: Vec<(i64, StopId)>,
}

/// Calls of a trip that was already resolved, kept in case it reappears.
struct FlushedTrip {
    rank: u64,
    stop_times: Vec<(i64, StopId)>,
}

/// Per-trip accumulator. Trips are flushed in order of first appearance so
/// that the first-seen tie-break is deterministic.
pub struct StopTimeAggregator {
    policy: FlushPolicy,
    pending: Vec<PendingTrip>,
    index: HashMap<TripId, usize>,
    flushed: HashMap<TripId, FlushedTrip>,
    /// Rank of the trip whose order each direction currently holds.
    owners: HashMap<(RouteId, DirectionId), u64>,
    next_rank: u64,
    last_trip: Option<TripId>,
    counters: AggregateCounters,
}

impl StopTimeAggregator {
    pub fn new(policy: FlushPolicy) -> Self {
        Self {
            policy,
            pending: Vec::new(),
            index: HashMap::new(),
            flushed: HashMap::new(),
            owners: HashMap::new(),
            next_rank: 0,
            last_trip: None,
            counters: AggregateCounters::default(),
        }
    }

    pub fn counters(&self) -> AggregateCounters {
        self.counters
    }

    /// Trips currently held in the accumulator.
    pub fn pending_trips(&self) -> usize {
        self.pending.len()
    }

    /// Consumes one batch. Under [`FlushPolicy::PerChunk`] every trip except
    /// the one the batch ended on is flushed afterwards, since that trip may
    /// continue in the next batch.
    pub fn ingest_chunk(&mut self, model: &mut TransitModel, chunk: Vec<StopTimeRecord>) {
        for row in chunk {
            self.ingest_row(model, row);
        }
        if self.policy == FlushPolicy::PerChunk {
            self.flush(model, true);
        }
    }

    fn ingest_row(&mut self, model: &mut TransitModel, row: StopTimeRecord) {
        self.counters.rows += 1;

        let Some(trip) = model.trips.get(row.trip_id.as_str()) else {
            self.counters.unresolved_trip += 1;
            let err = GtfsError::unresolved(StopTimeRecord::FILE, ReferenceKind::Trip, &row.trip_id);
            debug!(error = %err, "Discarding stop time");
            return;
        };
        let Some(stop) = model.stops.get_mut(row.stop_id.as_str()) else {
            self.counters.unresolved_stop += 1;
            let err = GtfsError::unresolved(StopTimeRecord::FILE, ReferenceKind::Stop, &row.stop_id);
            debug!(error = %err, "Discarding stop time");
            return;
        };
        let Ok(sequence) = row.stop_sequence.parse::<i64>() else {
            self.counters.bad_sequence += 1;
            let err = GtfsError::row_parse(
                StopTimeRecord::FILE,
                row.line,
                format!("stop_sequence '{}' is not an integer", row.stop_sequence),
            );
            warn!(trip_id = %trip.id, error = %err, "Discarding stop time");
            return;
        };

        stop.record_call(&trip.route_id, &trip.direction_id);
        let stop_id = stop.id.clone();
        let trip_id = trip.id.clone();
        self.accumulate(trip_id, sequence, stop_id);
    }

    fn accumulate(&mut self, trip_id: TripId, sequence: i64, stop_id: StopId) {
        if let Some(&idx) = self.index.get(&trip_id) {
            self.pending[idx].stop_times.push((sequence, stop_id));
        } else {
            let pending = match self.flushed.remove(&trip_id) {
                Some(mut earlier) => {
                    self.counters.split_trips += 1;
                    debug!(
                        trip_id = %trip_id,
                        earlier_calls = earlier.stop_times.len(),
                        "Trip rows are not contiguous; merging with resolved calls"
                    );
                    earlier.stop_times.push((sequence, stop_id));
                    PendingTrip {
                        trip_id: trip_id.clone(),
                        rank: earlier.rank,
                        stop_times: earlier.stop_times,
                    }
                }
                None => {
                    let rank = self.next_rank;
                    self.next_rank += 1;
                    PendingTrip {
                        trip_id: trip_id.clone(),
                        rank,
                        stop_times: vec![(sequence, stop_id)],
                    }
                }
            };
            self.index.insert(trip_id.clone(), self.pending.len());
            self.pending.push(pending);
        }
        self.last_trip = Some(trip_id);
    }

    /// Resolves every remaining trip. Call once after the last batch.
    pub fn finish(&mut self, model: &mut TransitModel) {
        self.flush(model, false);
        self.last_trip = None;
        self.flushed.clear();
        self.owners.clear();
    }

    /// Offers pending trips to their directions. `keep_last` holds back the
    /// trip the stream is currently on and retains the calls of everything
    /// flushed, since any of those trips may still continue.
    fn flush(&mut self, model: &mut TransitModel, keep_last: bool) {
        let mut carried = None;
        for pending in std::mem::take(&mut self.pending) {
            if keep_last && self.last_trip.as_ref() == Some(&pending.trip_id) {
                carried = Some(pending);
                continue;
            }
            let PendingTrip {
                trip_id,
                rank,
                stop_times,
            } = pending;
            let Some(trip) = model.trips.get(&trip_id) else {
                continue;
            };

            let key = (trip.route_id.clone(), trip.direction_id.clone());
            let tie = match self.owners.get(&key) {
                Some(&owner) if rank < owner => TieBreak::TakeCandidate,
                _ => TieBreak::KeepStored,
            };
            let retained = keep_last.then(|| stop_times.clone());
            let resolution = resolve_trip_with(&mut model.routes, trip, stop_times, tie);
            self.counters.record(resolution);

            let takes_order = match resolution {
                Resolution::Created | Resolution::Replaced => true,
                Resolution::Tied => tie == TieBreak::TakeCandidate,
                _ => false,
            };
            if takes_order {
                self.owners.insert(key, rank);
            }
            if let Some(stop_times) = retained {
                self.flushed.insert(trip_id, FlushedTrip { rank, stop_times });
            }
        }

        self.index.clear();
        if let Some(pending) = carried {
            self.index.insert(pending.trip_id.clone(), 0);
            self.pending.push(pending);
        }
    }
}
