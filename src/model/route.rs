use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::{DirectionId, RouteId, StopId, TripId};

/// GTFS basic route types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RouteType {
    Tram,
    Metro,
    Rail,
    Bus,
    Ferry,
    CableTram,
    AerialLift,
    Funicular,
    Trolleybus,
    Monorail,
}

impl RouteType {
    pub fn from_code(code: i64) -> Option<Self> {
        use RouteType::*;
        Some(match code {
            0 => Tram,
            1 => Metro,
            2 => Rail,
            3 => Bus,
            4 => Ferry,
            5 => CableTram,
            6 => AerialLift,
            7 => Funicular,
            11 => Trolleybus,
            12 => Monorail,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        use RouteType::*;
        match self {
            Tram => "Tram",
            Metro => "Metro",
            Rail => "Rail",
            Bus => "Bus",
            Ferry => "Ferry",
            CableTram => "Cable tram",
            AerialLift => "Aerial lift",
            Funicular => "Funicular",
            Trolleybus => "Trolleybus",
            Monorail => "Monorail",
        }
    }
}

/// Ordered stops for one (route, direction), plus the trips that supplied
/// a sequence of exactly that length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DirectionSequence {
    pub stops: Vec<StopId>,
    pub trips: BTreeSet<TripId>,
}

impl DirectionSequence {
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stops.is_empty()
    }

    /// Smallest contributing trip id, used as the representative trip.
    pub fn representative_trip(&self) -> Option<&TripId> {
        self.trips.iter().next()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Route {
    pub id: RouteId,
    pub short_name: String,
    pub long_name: String,
    pub route_type: RouteType,
    /// `#RRGGBB`
    pub color: String,
    pub agency_id: Option<String>,
    pub directions: BTreeMap<DirectionId, DirectionSequence>,
}

impl Route {
    /// Stop count summed over all directions.
    pub fn total_stops(&self) -> usize {
        self.directions.values().map(DirectionSequence::len).sum()
    }

    pub fn is_night_line(&self) -> bool {
        self.short_name.starts_with(['N', 'n'])
    }
}
