//! Normalised transit model produced by the pipeline.

mod ids;
mod route;
mod stop;
mod trip;

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::calendar::Calendar;

pub use ids::{DirectionId, RouteId, ServiceId, StopId, TripId};
pub use route::{DirectionSequence, Route, RouteType};
pub use stop::{StationVariantGroup, Stop, StopVariant, name_key};
pub use trip::Trip;

#[derive(Clone, Debug, Serialize)]
pub struct Agency {
    pub id: Option<String>,
    pub name: String,
    pub url: Option<String>,
    pub timezone: Option<String>,
}

/// Everything derived from one feed. Built by a single pipeline run and
/// owned by the caller afterwards.
#[derive(Clone, Debug, Default, Serialize)]
pub struct TransitModel {
    pub routes: BTreeMap<RouteId, Route>,
    pub stops: BTreeMap<StopId, Stop>,
    pub trips: BTreeMap<TripId, Trip>,
    /// Keyed by the trimmed, lower-cased stop name.
    pub stations: BTreeMap<String, StationVariantGroup>,
    pub calendar: Calendar,
    pub agencies: Vec<Agency>,
}

impl TransitModel {
    /// Trips of a route, optionally restricted to services running on `date`.
    /// Trips without a service id never match a date filter.
    pub fn trips_for_route(&self, route_id: &str, date: Option<NaiveDate>) -> Vec<&Trip> {
        let active = date.map(|d| self.calendar.active_services(d));
        self.trips
            .values()
            .filter(|t| t.route_id.as_str() == route_id)
            .filter(|t| match (&active, &t.service_id) {
                (None, _) => true,
                (Some(active), Some(service)) => active.contains(service),
                (Some(_), None) => false,
            })
            .collect()
    }

    /// Consolidated station entry for a name, compared case-insensitively.
    pub fn station(&self, name: &str) -> Option<&StationVariantGroup> {
        self.stations.get(&name_key(name))
    }

    /// All stops belonging to the station with the given name.
    pub fn stops_named(&self, name: &str) -> Vec<&Stop> {
        self.station(name)
            .map(|group| {
                group
                    .stops
                    .iter()
                    .filter_map(|id| self.stops.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn direction(&self, route_id: &str, direction_id: &str) -> Option<&DirectionSequence> {
        self.routes.get(route_id)?.directions.get(direction_id)
    }

    pub fn direction_count(&self) -> usize {
        self.routes.values().map(|r| r.directions.len()).sum()
    }

    pub fn variant_stop_count(&self) -> usize {
        self.stops.values().filter(|s| s.is_variant()).count()
    }
}
