use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::Category;
use crate::model::{Route, RouteId, Stop, TransitModel};

fn header(out: &mut String, title: &str, generated_at: DateTime<Utc>) {
    out.push_str(&format!("# {title}\n\n"));
    out.push_str(&format!(
        "*Generated from GTFS data*  *Last updated: {}*\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
}

fn variant_note(stop: &Stop) -> &'static str {
    if stop.is_variant() { " (Variant)" } else { "" }
}

/// Route document: every route with its per-direction ordered stop list.
/// `routes` must already be sorted.
pub fn render_routes(
    category: Category,
    routes: &[&Route],
    model: &TransitModel,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    header(&mut out, &format!("{} Routes", category.title()), generated_at);

    for route in routes {
        out.push_str(&format!("## {} - {}\n", route.short_name, route.long_name));
        out.push_str(&format!("- **Line**: {}\n", route.short_name));
        out.push_str(&format!("- **Type**: {}\n", route.route_type.label()));
        out.push_str(&format!("- **Color**: {}\n", route.color));
        out.push_str(&format!("- **Stops**: {}\n\n", route.total_stops()));

        if route.directions.is_empty() {
            out.push_str("*No stop data for this route.*\n\n");
            continue;
        }

        for (direction_id, direction) in &route.directions {
            let trip = direction.representative_trip();
            out.push_str(&format!(
                "### Direction: {} (Trip ID: {})\n",
                direction_id.long_label(),
                trip.map(|t| t.as_str()).unwrap_or("N/A")
            ));
            if let Some(headsign) = trip
                .and_then(|t| model.trips.get(t))
                .and_then(|t| t.headsign.as_deref())
            {
                out.push_str(&format!("- **Headsign**: {headsign}\n"));
            }
            out.push_str(&format!("- **Stops**: {}\n\n", direction.len()));

            out.push_str("#### Stops\n");
            for (i, stop_id) in direction.stops.iter().enumerate() {
                let Some(stop) = model.stops.get(stop_id) else {
                    continue;
                };
                out.push_str(&format!("{}. **{}{}**  \n", i + 1, stop.name, variant_note(stop)));
                out.push_str(&format!("   - Coordinates: {}, {}\n", stop.lat, stop.lon));
                out.push_str(&format!("   - Stop ID: {}\n\n", stop.id));
            }
        }
    }
    out
}

/// Station document: every stop any of the category's routes calls at,
/// short-turn stops included, grouped by consolidated name.
pub fn render_stations(
    category: Category,
    routes: &[&Route],
    model: &TransitModel,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    header(&mut out, &format!("{} Stations", category.title()), generated_at);

    let route_ids: BTreeSet<&RouteId> = routes.iter().map(|r| &r.id).collect();

    let mut by_name: BTreeMap<String, Vec<&Stop>> = BTreeMap::new();
    for stop in model
        .stops
        .values()
        .filter(|s| s.routes.keys().any(|id| route_ids.contains(id)))
    {
        by_name.entry(stop.name_key()).or_default().push(stop);
    }

    if by_name.is_empty() {
        out.push_str("*No stations.*\n");
        return out;
    }

    for (key, stops) in &by_name {
        let name = model
            .stations
            .get(key)
            .map(|g| g.name.as_str())
            .unwrap_or(stops[0].name.as_str());
        out.push_str(&format!("## {name}\n\n"));

        for stop in stops {
            out.push_str(&format!("- **Stop ID**: {}{}  \n", stop.id, variant_note(stop)));
            out.push_str(&format!("  - Coordinates: {}, {}  \n", stop.lat, stop.lon));
            let codes = stop.display_codes();
            if !codes.is_empty() {
                out.push_str(&format!("  - **Codes**: {}  \n", codes.join(", ")));
            }
            if let Some(variant) = &stop.variant {
                let siblings: Vec<&str> = variant.siblings.iter().map(|s| s.as_str()).collect();
                out.push_str(&format!("  - **Siblings**: {}  \n", siblings.join(", ")));
            }
            let served = served_by(stop, model);
            if !served.is_empty() {
                out.push_str(&format!("  - **Routes**: {}  \n", served.join(", ")));
            }
            out.push('\n');
        }
    }
    out
}

/// `short (In, Out)` entries for every route calling at `stop`, sorted.
pub fn served_by(stop: &Stop, model: &TransitModel) -> Vec<String> {
    let mut entries: Vec<String> = stop
        .routes
        .iter()
        .map(|(route_id, directions)| {
            let name = model
                .routes
                .get(route_id)
                .map(|r| r.short_name.as_str())
                .filter(|s| !s.is_empty())
                .unwrap_or(route_id.as_str());
            let mut labels: Vec<String> = directions.iter().map(|d| d.short_label()).collect();
            labels.sort();
            format!("{name} ({})", labels.join(", "))
        })
        .collect();
    entries.sort();
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consolidate::consolidate;
    use crate::model::{DirectionId, DirectionSequence, RouteType, StopId, Trip, TripId};
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap()
    }

    fn stop(id: &str, name: &str, code: &str) -> Stop {
        Stop {
            id: StopId::new(id),
            name: name.to_string(),
            lat: 48.21,
            lon: 16.36,
            codes: vec![code.to_string()],
            zone_id: None,
            parent_station: None,
            routes: BTreeMap::new(),
            variant: None,
        }
    }

    fn model() -> TransitModel {
        let mut model = TransitModel::default();
        for s in [
            stop("S1", "Schottentor", "4205"),
            stop("S2", "Schottentor", "4210"),
            stop("S3", "Rathaus", "17"),
        ] {
            model.stops.insert(s.id.clone(), s);
        }

        let mut directions = BTreeMap::new();
        directions.insert(
            DirectionId::new("0"),
            DirectionSequence {
                stops: vec![StopId::new("S1"), StopId::new("S3")],
                trips: BTreeSet::from([TripId::new("T2"), TripId::new("T1")]),
            },
        );
        directions.insert(
            DirectionId::new("1"),
            DirectionSequence {
                stops: vec![StopId::new("S3"), StopId::new("S2")],
                trips: BTreeSet::from([TripId::new("T3")]),
            },
        );
        model.routes.insert(
            RouteId::new("R1"),
            Route {
                id: RouteId::new("R1"),
                short_name: "D".to_string(),
                long_name: "Nussdorf - Hauptbahnhof".to_string(),
                route_type: RouteType::Tram,
                color: "#C4161C".to_string(),
                agency_id: None,
                directions,
            },
        );
        model.trips.insert(
            TripId::new("T1"),
            Trip {
                id: TripId::new("T1"),
                route_id: RouteId::new("R1"),
                direction_id: DirectionId::new("0"),
                headsign: Some("Hauptbahnhof".to_string()),
                service_id: None,
                shape_id: None,
            },
        );

        let r1 = RouteId::new("R1");
        for (s, d) in [("S1", "0"), ("S3", "0"), ("S3", "1"), ("S2", "1")] {
            if let Some(stop) = model.stops.get_mut(s) {
                stop.record_call(&r1, &DirectionId::new(d));
            }
        }
        model.stations = consolidate(&mut model.stops);
        model
    }

    #[test]
    fn test_route_document_lists_directions_in_order() {
        let model = model();
        let routes: Vec<&Route> = model.routes.values().collect();
        let doc = render_routes(Category::Tram, &routes, &model, at());

        assert!(doc.starts_with("# Tram (Straßenbahn) Routes\n"));
        assert!(doc.contains("*Last updated: 2025-03-03 12:00:00*"));
        assert!(doc.contains("- **Stops**: 4\n"));
        assert!(doc.contains("### Direction: Inbound (Trip ID: T1)\n- **Headsign**: Hauptbahnhof\n"));
        assert!(doc.contains("### Direction: Outbound (Trip ID: T3)\n"));

        let inbound = doc.find("Inbound").unwrap();
        let first = doc[inbound..].find("1. **Schottentor (Variant)**").unwrap();
        let second = doc[inbound..].find("2. **Rathaus**").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_station_document_groups_variants() {
        let model = model();
        let routes: Vec<&Route> = model.routes.values().collect();
        let doc = render_stations(Category::Tram, &routes, &model, at());

        assert_eq!(doc.matches("## Schottentor").count(), 1);
        assert!(doc.contains("- **Stop ID**: S1 (Variant)  \n"));
        assert!(doc.contains("  - **Codes**: 4205, 4210  \n"));
        assert!(doc.contains("  - **Siblings**: S2  \n"));
        assert!(doc.contains("  - **Routes**: D (In, Out)  \n"));
        assert!(doc.find("## Rathaus").unwrap() < doc.find("## Schottentor").unwrap());
    }

    #[test]
    fn test_station_document_includes_short_turn_stops() {
        let mut model = model();
        // Depot is only called at by a short working, so it is in no
        // representative sequence. Karlsplatz is served by nothing.
        let mut depot = stop("S4", "Depot", "900");
        depot.record_call(&RouteId::new("R1"), &DirectionId::new("0"));
        model.stops.insert(depot.id.clone(), depot);
        let idle = stop("S5", "Karlsplatz", "12");
        model.stops.insert(idle.id.clone(), idle);

        let routes: Vec<&Route> = model.routes.values().collect();
        let doc = render_stations(Category::Tram, &routes, &model, at());

        assert!(doc.contains("## Depot\n\n- **Stop ID**: S4  \n"));
        assert!(doc.contains("  - **Routes**: D (In)  \n"));
        assert!(!doc.contains("Karlsplatz"));
    }

    #[test]
    fn test_served_by_falls_back_to_route_id() {
        let mut model = model();
        if let Some(route) = model.routes.get_mut("R1") {
            route.short_name.clear();
        }
        let served = served_by(&model.stops["S3"], &model);
        assert_eq!(served, vec!["R1 (In, Out)".to_string()]);
    }
}
