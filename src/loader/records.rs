//! Row types for each GTFS table the pipeline reads.
//!
//! Each type names its file, whether the table is required, and the columns
//! that must be present in the header. Values stay textual here; numeric and
//! enum validation happens in the entity builder.

use serde::Deserialize;

/// A GTFS table row that can be read by the record loader.
pub trait GtfsRecord: for<'de> Deserialize<'de> {
    /// File name inside the feed directory, e.g. `routes.txt`.
    const FILE: &'static str;
    /// Whether a missing file aborts the load.
    const REQUIRED: bool;
    /// Columns that must appear in the header row.
    const REQUIRED_COLUMNS: &'static [&'static str];

    /// Stores the 1-based file line the row was read from. Rows validated
    /// after loading keep it for their error messages.
    fn set_line(&mut self, _line: u64) {}
}

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRecord {
    #[serde(skip)]
    pub line: u64,
    pub route_id: String,
    pub route_short_name: String,
    #[serde(default)]
    pub route_long_name: Option<String>,
    #[serde(default)]
    pub route_type: Option<String>,
    #[serde(default)]
    pub route_color: Option<String>,
    #[serde(default)]
    pub agency_id: Option<String>,
}

impl GtfsRecord for RouteRecord {
    const FILE: &'static str = "routes.txt";
    const REQUIRED: bool = true;
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["route_id", "route_short_name", "route_type"];

    fn set_line(&mut self, line: u64) {
        self.line = line;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: String,
    #[serde(default)]
    pub stop_lat: Option<String>,
    #[serde(default)]
    pub stop_lon: Option<String>,
    /// Rider/platform code; Wiener Linien publishes RBL numbers here.
    #[serde(default)]
    pub stop_code: Option<String>,
    #[serde(default)]
    pub zone_id: Option<String>,
    #[serde(default)]
    pub parent_station: Option<String>,
}

impl GtfsRecord for StopRecord {
    const FILE: &'static str = "stops.txt";
    const REQUIRED: bool = true;
    const REQUIRED_COLUMNS: &'static [&'static str] =
        &["stop_id", "stop_name", "stop_lat", "stop_lon"];
}

#[derive(Debug, Clone, Deserialize)]
pub struct TripRecord {
    pub trip_id: String,
    pub route_id: String,
    #[serde(default)]
    pub direction_id: Option<String>,
    #[serde(default)]
    pub service_id: Option<String>,
    #[serde(default)]
    pub trip_headsign: Option<String>,
    #[serde(default)]
    pub shape_id: Option<String>,
}

impl GtfsRecord for TripRecord {
    const FILE: &'static str = "trips.txt";
    const REQUIRED: bool = true;
    const REQUIRED_COLUMNS: &'static [&'static str] = &["trip_id", "route_id", "direction_id"];
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTimeRecord {
    #[serde(skip)]
    pub line: u64,
    pub trip_id: String,
    pub stop_id: String,
    pub stop_sequence: String,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
}

impl GtfsRecord for StopTimeRecord {
    const FILE: &'static str = "stop_times.txt";
    const REQUIRED: bool = true;
    const REQUIRED_COLUMNS: &'static [&'static str] = &["trip_id", "stop_id", "stop_sequence"];

    fn set_line(&mut self, line: u64) {
        self.line = line;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarRecord {
    #[serde(skip)]
    pub line: u64,
    pub service_id: String,
    pub monday: String,
    pub tuesday: String,
    pub wednesday: String,
    pub thursday: String,
    pub friday: String,
    pub saturday: String,
    pub sunday: String,
    pub start_date: String,
    pub end_date: String,
}

impl GtfsRecord for CalendarRecord {
    const FILE: &'static str = "calendar.txt";
    const REQUIRED: bool = false;
    const REQUIRED_COLUMNS: &'static [&'static str] = &[
        "service_id",
        "monday",
        "tuesday",
        "wednesday",
        "thursday",
        "friday",
        "saturday",
        "sunday",
        "start_date",
        "end_date",
    ];

    fn set_line(&mut self, line: u64) {
        self.line = line;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CalendarDateRecord {
    #[serde(skip)]
    pub line: u64,
    pub service_id: String,
    pub date: String,
    pub exception_type: String,
}

impl GtfsRecord for CalendarDateRecord {
    const FILE: &'static str = "calendar_dates.txt";
    const REQUIRED: bool = false;
    const REQUIRED_COLUMNS: &'static [&'static str] = &["service_id", "date", "exception_type"];

    fn set_line(&mut self, line: u64) {
        self.line = line;
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgencyRecord {
    #[serde(default)]
    pub agency_id: Option<String>,
    pub agency_name: String,
    #[serde(default)]
    pub agency_url: Option<String>,
    #[serde(default)]
    pub agency_timezone: Option<String>,
}

impl GtfsRecord for AgencyRecord {
    const FILE: &'static str = "agency.txt";
    const REQUIRED: bool = false;
    const REQUIRED_COLUMNS: &'static [&'static str] = &["agency_name"];
}

// Geometry is not used; rows are only counted.
#[derive(Debug, Clone, Deserialize)]
pub struct ShapeRecord {
    pub shape_id: String,
    pub shape_pt_sequence: String,
}

impl GtfsRecord for ShapeRecord {
    const FILE: &'static str = "shapes.txt";
    const REQUIRED: bool = false;
    const REQUIRED_COLUMNS: &'static [&'static str] = &["shape_id", "shape_pt_sequence"];
}

/// Required tables, in the order the pipeline checks for them.
pub const REQUIRED_FILES: &[&str] = &[
    RouteRecord::FILE,
    TripRecord::FILE,
    StopRecord::FILE,
    StopTimeRecord::FILE,
];
