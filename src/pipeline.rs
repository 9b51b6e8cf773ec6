//! Explicit pipeline context.
//!
//! A [`PipelineContext`] is created by the caller with a [`PipelineConfig`],
//! runs one feed directory through every stage and hands back the finished
//! [`TransitModel`]. Counters for the run stay on the context and can be read
//! through [`PipelineContext::summary`] afterwards. No state is shared between
//! contexts.

use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::aggregate::StopTimeAggregator;
use crate::builder::{self, BuildReport};
use crate::calendar::Calendar;
use crate::config::PipelineConfig;
use crate::consolidate::consolidate;
use crate::error::{GtfsError, Result};
use crate::loader::records::{
    AgencyRecord, CalendarDateRecord, CalendarRecord, RouteRecord, ShapeRecord, StopRecord,
    StopTimeRecord, TripRecord,
};
use crate::loader::{ChunkedTable, FeedDir, load_table};
use crate::model::{Agency, TransitModel};
use crate::output::format_discards;
use crate::stats::RunSummary;

pub struct PipelineContext {
    config: PipelineConfig,
    summary: RunSummary,
}

impl PipelineContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            summary: RunSummary::default(),
        }
    }

    /// Counters of the most recent run.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Loads and normalises one extracted feed.
    ///
    /// # Errors
    ///
    /// `MissingData` when a required table or column is absent, or an I/O
    /// error while reading. Row-level problems never fail the run; they are
    /// counted in the summary.
    #[tracing::instrument(skip(self, dir), fields(dir = %dir.display(), chunk_size = self.config.chunk_size))]
    pub fn run(&mut self, dir: &Path) -> Result<TransitModel> {
        let started = Instant::now();
        self.summary = RunSummary::new(&dir.display().to_string());

        let feed = FeedDir::new(dir);
        feed.check_required()?;

        let mut model = self.build_entities(&feed)?;
        self.aggregate_stop_times(&feed, &mut model)?;
        self.load_optional(&feed, &mut model)?;

        model.stations = consolidate(&mut model.stops);
        self.report_empty(&model);

        let summary = &mut self.summary;
        summary.routes = model.routes.len();
        summary.stops = model.stops.len();
        summary.trips = model.trips.len();
        summary.directions = model.direction_count();
        summary.variant_stops = model.variant_stop_count();
        summary.station_groups = model.stations.len();
        summary.agencies = model.agencies.len();
        summary.calendar_services = model.calendar.services.len();
        summary.elapsed_ms = started.elapsed().as_millis() as i64;

        self.log_summary();
        Ok(model)
    }

    fn build_entities(&mut self, feed: &FeedDir) -> Result<TransitModel> {
        let routes = load_table::<RouteRecord>(feed)?;
        let stops = load_table::<StopRecord>(feed)?;
        let trips = load_table::<TripRecord>(feed)?;
        self.summary.row_parse += routes.skipped + stops.skipped + trips.skipped;

        let mut report = BuildReport::default();
        let routes = builder::build_routes(routes.rows, &mut report);
        let stops = builder::build_stops(stops.rows, &mut report);
        let trips = builder::build_trips(trips.rows, &routes, &mut report);

        self.summary.routes_skipped = report.routes_skipped;
        self.summary.trips_skipped = report.trips_skipped;
        self.summary.stops_bad_coordinates = report.stops_bad_coordinates;

        Ok(TransitModel {
            routes,
            stops,
            trips,
            ..Default::default()
        })
    }

    #[tracing::instrument(skip_all, fields(flush = ?self.config.flush))]
    fn aggregate_stop_times(&mut self, feed: &FeedDir, model: &mut TransitModel) -> Result<()> {
        let mut table = ChunkedTable::<StopTimeRecord>::open(feed, self.config.chunk_size)?;
        let mut aggregator = StopTimeAggregator::new(self.config.flush);

        while let Some(chunk) = table.next_chunk()? {
            let rows = chunk.len();
            aggregator.ingest_chunk(model, chunk);
            info!(
                chunk = table.chunks(),
                rows,
                total_rows = table.rows_read(),
                pending_trips = aggregator.pending_trips(),
                "Processed stop_times chunk"
            );
        }
        aggregator.finish(model);

        let counters = aggregator.counters();
        let summary = &mut self.summary;
        summary.chunks = table.chunks();
        summary.stop_time_rows = counters.rows;
        summary.row_parse += table.skipped();
        summary.unresolved_trip = counters.unresolved_trip;
        summary.unresolved_stop = counters.unresolved_stop;
        summary.bad_sequence = counters.bad_sequence;
        summary.split_trips = counters.split_trips;

        info!(
            rows = counters.rows,
            discarded = counters.discarded(),
            created = counters.created,
            replaced = counters.replaced,
            tied = counters.tied,
            shorter = counters.shorter,
            "Resolved directions"
        );
        Ok(())
    }

    fn load_optional(&mut self, feed: &FeedDir, model: &mut TransitModel) -> Result<()> {
        let calendar = load_table::<CalendarRecord>(feed)?;
        let dates = load_table::<CalendarDateRecord>(feed)?;
        let (built, skipped) = Calendar::build(calendar.rows, dates.rows);
        model.calendar = built;
        self.summary.row_parse += calendar.skipped + dates.skipped + skipped;

        let agencies = load_table::<AgencyRecord>(feed)?;
        self.summary.row_parse += agencies.skipped;
        model.agencies = agencies
            .rows
            .into_iter()
            .map(|a| Agency {
                id: a.agency_id,
                name: a.agency_name,
                url: a.agency_url,
                timezone: a.agency_timezone,
            })
            .collect();
        if !model.agencies.is_empty() {
            let names: Vec<&str> = model.agencies.iter().map(|a| a.name.as_str()).collect();
            info!(agencies = ?names, "Loaded agencies");
        }

        // Shapes can be large; stream them and keep only the count.
        let mut shapes = ChunkedTable::<ShapeRecord>::open(feed, self.config.chunk_size)?;
        let mut shape_rows = 0;
        while let Some(chunk) = shapes.next_chunk()? {
            shape_rows += chunk.len();
        }
        self.summary.shape_rows = shape_rows;
        self.summary.row_parse += shapes.skipped();
        Ok(())
    }

    fn report_empty(&mut self, model: &TransitModel) {
        for route in model.routes.values().filter(|r| r.directions.is_empty()) {
            let err = GtfsError::EmptyResult {
                what: format!("route {} has no directions", route.id),
            };
            warn!(route_id = %route.id, short_name = %route.short_name, error = %err, "Route without stop data");
            self.summary.routes_without_directions += 1;
        }

        let unserved = model.stops.values().filter(|s| s.routes.is_empty()).count();
        if unserved > 0 {
            let err = GtfsError::EmptyResult {
                what: format!("{unserved} stops are served by no route"),
            };
            warn!(error = %err, "Stops without routes");
        }
        self.summary.stops_without_routes = unserved;
    }

    fn log_summary(&self) {
        let s = &self.summary;
        info!(
            feed_dir = %s.feed_dir,
            routes = s.routes,
            stops = s.stops,
            trips = s.trips,
            directions = s.directions,
            station_groups = s.station_groups,
            variant_stops = s.variant_stops,
            stop_time_rows = s.stop_time_rows,
            chunks = s.chunks,
            discarded = s.discarded_stop_times(),
            discard_pct = format!("{:.2}", s.discard_pct()),
            recovered_rows = s.recovered_rows(),
            discards = %format_discards(s),
            calendar_services = s.calendar_services,
            shape_rows = s.shape_rows,
            elapsed_ms = s.elapsed_ms,
            "Pipeline finished"
        );
    }
}
