//! Markdown emitter.
//!
//! Routes are split into display categories. Each non-empty category yields a
//! route document and a station document, handed together to a
//! [`MarkdownSink`]. Rendering is pure; only the sink touches the filesystem.
//! Every category is rendered before the first write, and the sink is told to
//! commit only once all writes succeeded, so a failed run leaves no mix of
//! old and new documents behind.

mod render;

use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{GtfsError, Result};
use crate::model::{Route, RouteType, TransitModel};

pub use render::{render_routes, render_stations, served_by};

/// Display category of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Category {
    Tram,
    Metro,
    Bus,
    NightBus,
    Funicular,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Tram,
        Category::Metro,
        Category::Bus,
        Category::NightBus,
        Category::Funicular,
        Category::Other,
    ];

    pub fn of(route: &Route) -> Self {
        match route.route_type {
            RouteType::Tram => Category::Tram,
            RouteType::Metro => Category::Metro,
            RouteType::Bus if route.is_night_line() => Category::NightBus,
            RouteType::Bus => Category::Bus,
            RouteType::Funicular => Category::Funicular,
            _ => Category::Other,
        }
    }

    /// File name prefix.
    pub fn slug(self) -> &'static str {
        match self {
            Category::Tram => "tram",
            Category::Metro => "tube",
            Category::Bus => "bus",
            Category::NightBus => "nightbus",
            Category::Funicular => "funicular",
            Category::Other => "other",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Category::Tram => "Tram (Straßenbahn)",
            Category::Metro => "U-Bahn (Metro)",
            Category::Bus => "Bus",
            Category::NightBus => "Night Bus",
            Category::Funicular => "Funicular",
            Category::Other => "Other",
        }
    }

    pub fn routes_file(self) -> String {
        format!("{}routes.md", self.slug())
    }

    pub fn stations_file(self) -> String {
        format!("{}stations.md", self.slug())
    }
}

/// Both documents of one category.
#[derive(Debug, Clone)]
pub struct CategoryDocuments {
    pub category: Category,
    pub routes: String,
    pub stations: String,
}

/// Receives rendered documents, once per non-empty category.
pub trait MarkdownSink {
    fn write_category(&mut self, docs: &CategoryDocuments) -> Result<()>;

    /// Called once after every category was written.
    fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called instead of [`MarkdownSink::commit`] when a write failed.
    fn abort(&mut self) {}
}

/// Writes documents into a directory. Files are staged under a `.tmp` name
/// and only renamed into place on commit.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    staged: Vec<(PathBuf, PathBuf)>,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            staged: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Paths committed so far, in write order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn stage(&mut self, name: &str, body: &str) -> Result<()> {
        let target = self.dir.join(name);
        let tmp = self.dir.join(format!("{name}.tmp"));
        fs::write(&tmp, body)?;
        debug!(path = %tmp.display(), bytes = body.len(), "Staged markdown");
        self.staged.push((tmp, target));
        Ok(())
    }
}

impl MarkdownSink for DirectorySink {
    fn write_category(&mut self, docs: &CategoryDocuments) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        self.stage(&docs.category.routes_file(), &docs.routes)?;
        self.stage(&docs.category.stations_file(), &docs.stations)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut files = staged.into_iter();
        while let Some((tmp, target)) = files.next() {
            if let Err(e) = fs::rename(&tmp, &target) {
                let _ = fs::remove_file(&tmp);
                self.staged = files.collect();
                self.abort();
                return Err(e.into());
            }
            info!(path = %target.display(), "Wrote markdown");
            self.written.push(target);
        }
        Ok(())
    }

    fn abort(&mut self) {
        for (tmp, _) in self.staged.drain(..) {
            let _ = fs::remove_file(&tmp);
        }
    }
}

/// Renders every non-empty category, then hands them to `sink` and commits.
/// Returns the number of categories written.
#[tracing::instrument(skip_all, fields(routes = model.routes.len()))]
pub fn emit<S: MarkdownSink>(
    model: &TransitModel,
    sink: &mut S,
    generated_at: DateTime<Utc>,
) -> Result<usize> {
    let mut rendered = Vec::new();
    for category in Category::ALL {
        let mut routes: Vec<&Route> = model
            .routes
            .values()
            .filter(|r| Category::of(r) == category)
            .collect();
        if routes.is_empty() {
            let err = GtfsError::EmptyResult {
                what: format!("no {} routes", category.slug()),
            };
            warn!(category = category.title(), error = %err, "Skipping category");
            continue;
        }
        routes.sort_by(|a, b| (&a.short_name, &a.id).cmp(&(&b.short_name, &b.id)));

        rendered.push(CategoryDocuments {
            category,
            routes: render_routes(category, &routes, model, generated_at),
            stations: render_stations(category, &routes, model, generated_at),
        });
    }

    for docs in &rendered {
        if let Err(e) = sink.write_category(docs) {
            warn!(category = docs.category.title(), error = %e, "Markdown write failed");
            sink.abort();
            return Err(e);
        }
    }
    sink.commit()?;
    info!(categories = rendered.len(), "Markdown emitted");
    Ok(rendered.len())
}
