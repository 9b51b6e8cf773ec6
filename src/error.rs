//! Error taxonomy for the GTFS normalisation pipeline.
//!
//! Only [`GtfsError::MissingData`] and the wrapped I/O, CSV, archive and
//! fetch errors ever leave the pipeline. Row-level problems are built as
//! values so they can be logged with full context, then counted and dropped.

use thiserror::Error;

/// What kind of entity a dangling reference pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Route,
    Trip,
    Stop,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReferenceKind::Route => "route",
            ReferenceKind::Trip => "trip",
            ReferenceKind::Stop => "stop",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum GtfsError {
    /// A required table, or a required column of it, is absent. Fatal.
    #[error("{}", missing_message(.file, .column.as_deref()))]
    MissingData {
        file: String,
        column: Option<String>,
    },

    /// A single row could not be parsed. Recovered by skipping the row.
    #[error("{file}:{line}: malformed row: {reason}")]
    RowParse {
        file: String,
        line: u64,
        reason: String,
    },

    /// A row references an entity that was never built. Recovered by skipping the row.
    #[error("{file}: unknown {kind} id '{id}'")]
    UnresolvedReference {
        file: String,
        kind: ReferenceKind,
        id: String,
    },

    /// Optional data is absent or something ended up with nothing derived from it.
    #[error("empty result: {what}")]
    EmptyResult { what: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Fetch(#[from] reqwest::Error),
}

fn missing_message(file: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("required column '{column}' missing from {file}"),
        None => format!("required file {file} is missing"),
    }
}

impl GtfsError {
    pub fn missing_file(file: &str) -> Self {
        GtfsError::MissingData {
            file: file.to_string(),
            column: None,
        }
    }

    pub fn missing_column(file: &str, column: &str) -> Self {
        GtfsError::MissingData {
            file: file.to_string(),
            column: Some(column.to_string()),
        }
    }

    pub fn row_parse(file: &str, line: u64, reason: impl Into<String>) -> Self {
        GtfsError::RowParse {
            file: file.to_string(),
            line,
            reason: reason.into(),
        }
    }

    pub fn unresolved(file: &str, kind: ReferenceKind, id: &str) -> Self {
        GtfsError::UnresolvedReference {
            file: file.to_string(),
            kind,
            id: id.to_string(),
        }
    }

    /// True for the conditions the pipeline recovers from locally.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GtfsError::RowParse { .. }
                | GtfsError::UnresolvedReference { .. }
                | GtfsError::EmptyResult { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, GtfsError>;
