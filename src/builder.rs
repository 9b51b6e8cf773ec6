//! Entity builder: validated [`Route`], [`Stop`] and [`Trip`] maps from raw rows.
//!
//! Nothing here is fatal. Bad routes and orphan trips are skipped with a
//! warning, bad stop coordinates fall back to `0.0`. Duplicate ids keep the
//! last row seen.

use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::error::{GtfsError, ReferenceKind};
use crate::loader::records::{GtfsRecord, RouteRecord, StopRecord, TripRecord};
use crate::model::{
    DirectionId, Route, RouteId, RouteType, ServiceId, Stop, StopId, Trip, TripId,
};

const DEFAULT_COLOR: &str = "#000000";

/// Counts of rows the builder dropped or patched.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub routes_skipped: u64,
    pub trips_skipped: u64,
    pub stops_bad_coordinates: u64,
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn build_routes(
    rows: Vec<RouteRecord>,
    report: &mut BuildReport,
) -> BTreeMap<RouteId, Route> {
    let mut routes = BTreeMap::new();
    for rec in rows {
        let route_type = match parse_route_type(rec.route_type.as_deref()) {
            Ok(route_type) => route_type,
            Err(reason) => {
                let err = GtfsError::row_parse(RouteRecord::FILE, rec.line, reason);
                warn!(route_id = %rec.route_id, error = %err, "Skipping route");
                report.routes_skipped += 1;
                continue;
            }
        };

        let id = RouteId::new(rec.route_id);
        routes.insert(
            id.clone(),
            Route {
                id,
                short_name: rec.route_short_name,
                long_name: rec.route_long_name.unwrap_or_default(),
                route_type,
                color: normalize_color(rec.route_color.as_deref()),
                agency_id: rec.agency_id,
                directions: BTreeMap::new(),
            },
        );
    }
    info!(routes = routes.len(), skipped = report.routes_skipped, "Built routes");
    routes
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn build_stops(rows: Vec<StopRecord>, report: &mut BuildReport) -> BTreeMap<StopId, Stop> {
    let mut stops = BTreeMap::new();
    for rec in rows {
        let lat = parse_coordinate(&rec.stop_id, "stop_lat", rec.stop_lat.as_deref(), report);
        let lon = parse_coordinate(&rec.stop_id, "stop_lon", rec.stop_lon.as_deref(), report);
        let id = StopId::new(rec.stop_id);
        stops.insert(
            id.clone(),
            Stop {
                id,
                name: rec.stop_name.trim().to_string(),
                lat,
                lon,
                codes: rec.stop_code.into_iter().collect(),
                zone_id: rec.zone_id,
                parent_station: rec.parent_station,
                routes: BTreeMap::new(),
                variant: None,
            },
        );
    }
    info!(
        stops = stops.len(),
        bad_coordinates = report.stops_bad_coordinates,
        "Built stops"
    );
    stops
}

#[tracing::instrument(skip_all, fields(rows = rows.len()))]
pub fn build_trips(
    rows: Vec<TripRecord>,
    routes: &BTreeMap<RouteId, Route>,
    report: &mut BuildReport,
) -> BTreeMap<TripId, Trip> {
    let mut trips = BTreeMap::new();
    for rec in rows {
        if !routes.contains_key(rec.route_id.as_str()) {
            let err = GtfsError::unresolved(TripRecord::FILE, ReferenceKind::Route, &rec.route_id);
            warn!(trip_id = %rec.trip_id, error = %err, "Skipping trip");
            report.trips_skipped += 1;
            continue;
        }

        let id = TripId::new(rec.trip_id);
        trips.insert(
            id.clone(),
            Trip {
                id,
                route_id: RouteId::new(rec.route_id),
                direction_id: rec
                    .direction_id
                    .map(DirectionId::new)
                    .unwrap_or_else(DirectionId::default_direction),
                headsign: rec.trip_headsign,
                service_id: rec.service_id.map(ServiceId::new),
                shape_id: rec.shape_id,
            },
        );
    }
    info!(trips = trips.len(), skipped = report.trips_skipped, "Built trips");
    trips
}

fn parse_route_type(value: Option<&str>) -> Result<RouteType, String> {
    let value = value.ok_or_else(|| "route_type is empty".to_string())?;
    let code: i64 = value
        .parse()
        .map_err(|_| format!("route_type '{value}' is not an integer"))?;
    RouteType::from_code(code).ok_or_else(|| format!("route_type {code} is not a known code"))
}

fn parse_coordinate(
    stop_id: &str,
    column: &str,
    value: Option<&str>,
    report: &mut BuildReport,
) -> f64 {
    match value.map(str::parse::<f64>) {
        Some(Ok(v)) if v.is_finite() => v,
        _ => {
            warn!(stop_id, column, value = ?value, "Invalid coordinate, using 0.0");
            report.stops_bad_coordinates += 1;
            0.0
        }
    }
}

/// `#RRGGBB`, upper-case. Anything that is not six hex digits becomes black.
pub fn normalize_color(value: Option<&str>) -> String {
    match value.map(|v| v.trim().trim_start_matches('#')) {
        Some(hex) if hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            format!("#{}", hex.to_ascii_uppercase())
        }
        _ => DEFAULT_COLOR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(id: &str, route_type: Option<&str>) -> RouteRecord {
        RouteRecord {
            line: 2,
            route_id: id.to_string(),
            route_short_name: id.to_string(),
            route_long_name: None,
            route_type: route_type.map(String::from),
            route_color: None,
            agency_id: None,
        }
    }

    fn stop(id: &str, lat: Option<&str>) -> StopRecord {
        StopRecord {
            stop_id: id.to_string(),
            stop_name: format!(" Stop {id} "),
            stop_lat: lat.map(String::from),
            stop_lon: Some("16.37".to_string()),
            stop_code: Some(format!("RBL{id}")),
            zone_id: None,
            parent_station: None,
        }
    }

    fn trip(id: &str, route_id: &str, direction: Option<&str>) -> TripRecord {
        TripRecord {
            trip_id: id.to_string(),
            route_id: route_id.to_string(),
            direction_id: direction.map(String::from),
            service_id: Some("WD".to_string()),
            trip_headsign: None,
            shape_id: None,
        }
    }

    #[test]
    fn test_invalid_route_type_is_skipped() {
        let mut report = BuildReport::default();
        let routes = build_routes(
            vec![
                route("R1", Some("0")),
                route("R2", Some("tram")),
                route("R3", None),
                route("R4", Some("99")),
            ],
            &mut report,
        );
        assert_eq!(routes.len(), 1);
        assert_eq!(routes["R1"].route_type, RouteType::Tram);
        assert_eq!(report.routes_skipped, 3);
    }

    #[test]
    fn test_duplicate_route_ids_keep_last() {
        let mut report = BuildReport::default();
        let mut second = route("R1", Some("3"));
        second.route_short_name = "13A".to_string();
        let routes = build_routes(vec![route("R1", Some("0")), second], &mut report);
        assert_eq!(routes.len(), 1);
        assert_eq!(routes["R1"].short_name, "13A");
    }

    #[test]
    fn test_bad_coordinates_default_to_zero() {
        let mut report = BuildReport::default();
        let stops = build_stops(
            vec![stop("S1", Some("48.2")), stop("S2", Some("north")), stop("S3", None)],
            &mut report,
        );
        assert_eq!(stops.len(), 3);
        assert_eq!(stops["S1"].lat, 48.2);
        assert_eq!(stops["S2"].lat, 0.0);
        assert_eq!(stops["S3"].lat, 0.0);
        assert_eq!(stops["S1"].name, "Stop S1");
        assert_eq!(stops["S1"].codes, vec!["RBLS1".to_string()]);
        assert_eq!(report.stops_bad_coordinates, 2);
    }

    #[test]
    fn test_trips_with_unknown_route_are_skipped() {
        let mut report = BuildReport::default();
        let routes = build_routes(vec![route("R1", Some("0"))], &mut report);
        let trips = build_trips(
            vec![trip("T1", "R1", Some("1")), trip("T2", "R9", Some("0")), trip("T3", "R1", None)],
            &routes,
            &mut report,
        );
        assert_eq!(trips.len(), 2);
        assert_eq!(report.trips_skipped, 1);
        assert_eq!(trips["T1"].direction_id.as_str(), "1");
        assert_eq!(trips["T3"].direction_id.as_str(), "0");
    }

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color(Some("ff0000")), "#FF0000");
        assert_eq!(normalize_color(Some("#00a1de")), "#00A1DE");
        assert_eq!(normalize_color(Some("red")), "#000000");
        assert_eq!(normalize_color(None), "#000000");
    }
}
