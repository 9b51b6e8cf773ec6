//! Direction resolver: folds each trip's stop list into the representative
//! sequence of its (route, direction).
//!
//! The longest sequence wins. On a length tie the stored order is kept and
//! the trip is only added to the contributing set, so the first trip seen
//! at the maximum length decides the order. [`TieBreak::TakeCandidate`]
//! exists for a trip offered late that was seen before the stored one.

use std::collections::BTreeMap;

use crate::model::{DirectionSequence, Route, RouteId, StopId, Trip};

/// What happened when a trip was offered to its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The trip had no valid stop times.
    Empty,
    /// The trip's route is not in the route map.
    UnknownRoute,
    /// First non-empty sequence for this direction.
    Created,
    /// Strictly longer than the stored sequence; replaced it.
    Replaced,
    /// Same length; the trip joined the contributing set.
    Tied,
    /// Shorter; ignored.
    Shorter,
}

/// Whose order survives an equal-length offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    #[default]
    KeepStored,
    TakeCandidate,
}

impl DirectionSequence {
    /// Applies the longest-wins rule for one candidate stop list.
    pub fn offer(&mut self, trip: &Trip, stops: Vec<StopId>, tie: TieBreak) -> Resolution {
        let current = self.stops.len();
        if stops.len() > current {
            self.stops = stops;
            self.trips.clear();
            self.trips.insert(trip.id.clone());
            if current == 0 {
                Resolution::Created
            } else {
                Resolution::Replaced
            }
        } else if stops.len() == current {
            if tie == TieBreak::TakeCandidate {
                self.stops = stops;
            }
            self.trips.insert(trip.id.clone());
            Resolution::Tied
        } else {
            Resolution::Shorter
        }
    }
}

/// Orders a trip's accumulated `(stop_sequence, stop_id)` pairs and offers
/// them to the matching direction. The sort is stable, so equal sequence
/// numbers keep their original row order.
pub fn resolve_trip(
    routes: &mut BTreeMap<RouteId, Route>,
    trip: &Trip,
    stop_times: Vec<(i64, StopId)>,
) -> Resolution {
    resolve_trip_with(routes, trip, stop_times, TieBreak::KeepStored)
}

/// [`resolve_trip`] with an explicit tie-break.
pub fn resolve_trip_with(
    routes: &mut BTreeMap<RouteId, Route>,
    trip: &Trip,
    mut stop_times: Vec<(i64, StopId)>,
    tie: TieBreak,
) -> Resolution {
    if stop_times.is_empty() {
        return Resolution::Empty;
    }
    let Some(route) = routes.get_mut(&trip.route_id) else {
        return Resolution::UnknownRoute;
    };

    stop_times.sort_by_key(|(seq, _)| *seq);
    let ordered: Vec<StopId> = stop_times.into_iter().map(|(_, stop)| stop).collect();

    if let Some(direction) = route.directions.get_mut(&trip.direction_id) {
        return direction.offer(trip, ordered, tie);
    }
    let mut direction = DirectionSequence::default();
    let resolution = direction.offer(trip, ordered, tie);
    route.directions.insert(trip.direction_id.clone(), direction);
    resolution
}
