use chrono::{NaiveDate, TimeZone, Utc};
use gtfs_directions::config::{FlushPolicy, PipelineConfig};
use gtfs_directions::markdown::{self, DirectorySink};
use gtfs_directions::{GtfsError, PipelineContext};
use std::fs;
use std::path::{Path, PathBuf};

fn fixture_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "gtfs_directions_it_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// A small Vienna-flavoured feed: one tram, one metro line, one night bus,
/// a pair of same-named stops and a few broken rows.
fn write_feed(dir: &Path) {
    fs::write(
        dir.join("routes.txt"),
        "\u{feff}route_id,agency_id,route_short_name,route_long_name,route_type,route_color\n\
         R1,1,D,Nussdorf - Hauptbahnhof,0,c4161c\n\
         U1,1,U1,Leopoldau - Oberlaa,1,#E3000F\n\
         N25,1,N25,Schwedenplatz - Floridsdorf,3,\n\
         BAD,1,X,Broken,tram,\n",
    )
    .unwrap();
    fs::write(
        dir.join("stops.txt"),
        "stop_id,stop_name,stop_lat,stop_lon,stop_code\n\
         S1,Opera,48.2030,16.3690,101\n\
         S2,Ring,48.2100,16.3600,102\n\
         S3,Schottentor,48.2150,16.3620,4205\n\
         S4,Schottentor ,48.2152,16.3625,4210\n\
         S5,Karlsplatz,48.2005,16.3700,\n\
         S6,Floridsdorf,north,16.40,300\n",
    )
    .unwrap();
    fs::write(
        dir.join("trips.txt"),
        "route_id,service_id,trip_id,trip_headsign,direction_id\n\
         R1,WD,T1,Hauptbahnhof,0\n\
         R1,WD,T2,Hauptbahnhof,0\n\
         R1,SA,T3,Nussdorf,1\n\
         U1,WD,T4,Oberlaa,0\n\
         N25,WD,T5,Floridsdorf,\n\
         R9,WD,T6,Nowhere,0\n",
    )
    .unwrap();
    fs::write(
        dir.join("stop_times.txt"),
        "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
         T1,08:00:00,08:00:00,S1,2\n\
         T1,07:58:00,07:58:00,S2,1\n\
         T1,08:02:00,08:02:00,S3,3\n\
         T2,09:00:00,09:00:00,S2,1\n\
         T2,09:02:00,09:02:00,S1,2\n\
         T3,10:00:00,10:00:00,S4,1\n\
         T3,10:02:00,10:02:00,S2,2\n\
         T3,10:04:00,10:04:00,S1,abc\n\
         T4,11:00:00,11:00:00,S5,1\n\
         T4,11:02:00,11:02:00,S3,2\n\
         T4,11:04:00,11:04:00,S99,3\n\
         T5,01:00:00,01:00:00,S6,1\n\
         T6,01:00:00,01:00:00,S1,1\n\
         GHOST,02:00:00,02:00:00,S1,1\n",
    )
    .unwrap();
    fs::write(
        dir.join("calendar.txt"),
        "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
         WD,1,1,1,1,1,0,0,20250101,20251231\n\
         SA,0,0,0,0,0,1,0,20250101,20251231\n",
    )
    .unwrap();
    fs::write(
        dir.join("agency.txt"),
        "agency_id,agency_name,agency_url,agency_timezone\n\
         1,Wiener Linien,https://www.wienerlinien.at,Europe/Vienna\n",
    )
    .unwrap();
}

fn config(chunk_size: usize) -> PipelineConfig {
    PipelineConfig {
        chunk_size,
        summary_csv: None,
        ..Default::default()
    }
}

fn stop_ids(model: &gtfs_directions::TransitModel, route: &str, dir: &str) -> Vec<String> {
    model
        .direction(route, dir)
        .map(|d| d.stops.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default()
}

#[test]
fn test_full_pipeline() {
    let dir = fixture_dir("full");
    write_feed(&dir);

    let mut ctx = PipelineContext::new(config(4));
    let model = ctx.run(&dir).unwrap();
    let summary = ctx.summary();

    // Entity builder
    assert_eq!(summary.routes, 3);
    assert_eq!(summary.routes_skipped, 1);
    assert_eq!(summary.trips, 5);
    assert_eq!(summary.trips_skipped, 1);
    assert_eq!(summary.stops_bad_coordinates, 1);
    assert_eq!(model.routes["U1"].color, "#E3000F");
    assert_eq!(model.trips["T5"].direction_id.as_str(), "0");

    // Aggregation: GHOST and T6 (dropped trip) are unresolved, S99 is unknown, "abc" is bad
    assert_eq!(summary.stop_time_rows, 14);
    assert_eq!(summary.chunks, 4);
    assert_eq!(summary.unresolved_trip, 2);
    assert_eq!(summary.unresolved_stop, 1);
    assert_eq!(summary.bad_sequence, 1);
    assert_eq!(summary.discarded_stop_times(), 4);

    // Directions follow stop_sequence, longest wins
    assert_eq!(stop_ids(&model, "R1", "0"), vec!["S2", "S1", "S3"]);
    assert_eq!(stop_ids(&model, "R1", "1"), vec!["S4", "S2"]);
    assert_eq!(stop_ids(&model, "U1", "0"), vec!["S5", "S3"]);
    assert_eq!(model.direction("R1", "0").unwrap().trips.len(), 1);

    // Served-by
    let opera = &model.stops["S1"];
    assert_eq!(opera.routes.len(), 1);
    assert!(opera.routes["R1"].contains("0"));
    assert!(!opera.routes["R1"].contains("1"));

    // Consolidation
    let schottentor = model.station("SCHOTTENTOR").unwrap();
    assert_eq!(schottentor.stops.len(), 2);
    let variant = model.stops["S3"].variant.as_ref().unwrap();
    assert_eq!(variant.siblings.len(), 1);
    assert_eq!(variant.siblings[0].as_str(), "S4");
    assert_eq!(variant.codes, vec!["4205".to_string(), "4210".to_string()]);
    assert_eq!(summary.variant_stops, 2);

    // Optional tables
    assert_eq!(summary.calendar_services, 2);
    assert_eq!(model.agencies[0].name, "Wiener Linien");
    let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
    assert_eq!(model.trips_for_route("R1", Some(monday)).len(), 2);
    assert_eq!(model.trips_for_route("R1", Some(saturday)).len(), 1);
    assert_eq!(model.trips_for_route("R1", None).len(), 3);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_calendar_is_not_an_error() {
    let dir = fixture_dir("no_calendar");
    write_feed(&dir);
    fs::remove_file(dir.join("calendar.txt")).unwrap();

    let mut ctx = PipelineContext::new(config(100));
    let model = ctx.run(&dir).unwrap();

    assert!(model.calendar.is_empty());
    assert_eq!(ctx.summary().calendar_services, 0);
    assert!(model.direction("R1", "0").is_some());
    let monday = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
    assert!(model.trips_for_route("R1", Some(monday)).is_empty());

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_required_table_fails() {
    let dir = fixture_dir("no_stop_times");
    write_feed(&dir);
    fs::remove_file(dir.join("stop_times.txt")).unwrap();

    let err = PipelineContext::new(config(100)).run(&dir).unwrap_err();
    assert!(matches!(
        err,
        GtfsError::MissingData { ref file, column: None } if file == "stop_times.txt"
    ));

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_missing_required_column_fails() {
    let dir = fixture_dir("no_direction_column");
    write_feed(&dir);
    fs::write(dir.join("trips.txt"), "route_id,trip_id\nR1,T1\n").unwrap();

    let err = PipelineContext::new(config(100)).run(&dir).unwrap_err();
    assert_eq!(
        err.to_string(),
        "required column 'direction_id' missing from trips.txt"
    );

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_rerun_is_deterministic() {
    let dir = fixture_dir("determinism");
    write_feed(&dir);

    let first = PipelineContext::new(config(3)).run(&dir).unwrap();
    let second = PipelineContext::new(config(3)).run(&dir).unwrap();
    let whole = PipelineContext::new(PipelineConfig {
        flush: FlushPolicy::EndOfStream,
        ..config(1000)
    })
    .run(&dir)
    .unwrap();

    let a = serde_json::to_string(&first).unwrap();
    let b = serde_json::to_string(&second).unwrap();
    let c = serde_json::to_string(&whole).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_markdown_written_per_category() {
    let dir = fixture_dir("markdown");
    write_feed(&dir);
    let out = dir.join("out");

    let model = PipelineContext::new(config(100)).run(&dir).unwrap();
    let mut sink = DirectorySink::new(&out);
    let generated_at = Utc.with_ymd_and_hms(2025, 3, 3, 6, 0, 0).unwrap();
    let written = markdown::emit(&model, &mut sink, generated_at).unwrap();

    assert_eq!(written, 3);
    for file in [
        "tramroutes.md",
        "tramstations.md",
        "tuberoutes.md",
        "tubestations.md",
        "nightbusroutes.md",
        "nightbusstations.md",
    ] {
        assert!(out.join(file).exists(), "{file} missing");
    }
    assert!(!out.join("busroutes.md").exists());

    let tram = fs::read_to_string(out.join("tramroutes.md")).unwrap();
    assert!(tram.contains("## D - Nussdorf - Hauptbahnhof"));
    assert!(tram.contains("- **Color**: #C4161C"));
    assert!(tram.contains("### Direction: Inbound (Trip ID: T1)"));
    assert!(tram.contains("3. **Schottentor (Variant)**"));

    let stations = fs::read_to_string(out.join("tramstations.md")).unwrap();
    assert!(stations.contains("## Schottentor"));
    assert!(stations.contains("  - **Routes**: D (In)  "));
    assert!(stations.contains("  - **Routes**: D (In, Out)  "));

    fs::remove_dir_all(&dir).unwrap();
}
