//! Record loader for GTFS text tables.
//!
//! Small tables are materialised whole with [`load_table`]. `stop_times.txt`
//! is read through [`ChunkedTable`], which hands out fixed-size batches on
//! demand so the caller can process one batch before the next is read.
//! File handles are owned by the readers and released when they drop.

pub mod records;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::marker::PhantomData;
use std::path::PathBuf;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::error::{GtfsError, Result};
use records::GtfsRecord;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Directory holding the extracted feed tables.
#[derive(Debug, Clone)]
pub struct FeedDir {
    root: PathBuf,
}

impl FeedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.root.join(file)
    }

    pub fn has(&self, file: &str) -> bool {
        self.path_of(file).is_file()
    }

    /// Fails with `MissingData` naming the first required table that is absent.
    pub fn check_required(&self) -> Result<()> {
        for file in records::REQUIRED_FILES {
            if !self.has(file) {
                return Err(GtfsError::missing_file(file));
            }
        }
        Ok(())
    }
}

/// A fully materialised table.
#[derive(Debug)]
pub struct Table<T> {
    pub rows: Vec<T>,
    /// Rows dropped as malformed.
    pub skipped: u64,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: 0,
        }
    }
}

/// Streams typed rows out of one table, skipping malformed rows.
pub struct RecordReader<T> {
    csv: csv::Reader<BufReader<File>>,
    headers: StringRecord,
    record: StringRecord,
    rows_read: u64,
    skipped: u64,
    _row: PhantomData<T>,
}

impl<T: GtfsRecord> RecordReader<T> {
    /// Opens the table, returning `None` when the file does not exist.
    ///
    /// # Errors
    ///
    /// `MissingData` if a required column is absent from the header, or an
    /// I/O error if the file exists but cannot be read.
    pub fn open(dir: &FeedDir) -> Result<Option<Self>> {
        let path = dir.path_of(T::FILE);
        if !path.is_file() {
            return Ok(None);
        }

        let mut reader = BufReader::new(File::open(&path)?);
        if reader.fill_buf()?.starts_with(UTF8_BOM) {
            reader.consume(UTF8_BOM.len());
        }

        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv.headers()?.clone();

        for column in T::REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == *column) {
                return Err(GtfsError::missing_column(T::FILE, column));
            }
        }

        debug!(file = T::FILE, columns = headers.len(), "Opened table");
        Ok(Some(Self {
            csv,
            headers,
            record: StringRecord::new(),
            rows_read: 0,
            skipped: 0,
            _row: PhantomData,
        }))
    }

    /// Next well-formed row, or `None` at end of file.
    pub fn next_row(&mut self) -> Result<Option<T>> {
        loop {
            match self.csv.read_record(&mut self.record) {
                Ok(false) => return Ok(None),
                Ok(true) => {}
                Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    self.skip(GtfsError::row_parse(T::FILE, line, e.to_string()));
                    continue;
                }
            }

            self.rows_read += 1;
            let line = self
                .record
                .position()
                .map(|p| p.line())
                .unwrap_or(self.rows_read + 1);
            match self.record.deserialize::<T>(Some(&self.headers)) {
                Ok(mut row) => {
                    row.set_line(line);
                    return Ok(Some(row));
                }
                Err(e) => self.skip(GtfsError::row_parse(T::FILE, line, e.to_string())),
            }
        }
    }

    fn skip(&mut self, err: GtfsError) {
        warn!(error = %err, "Skipping malformed row");
        self.skipped += 1;
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Loads a whole table.
///
/// A missing required table is a `MissingData` error. A missing optional
/// table yields an empty [`Table`] and a warning.
#[tracing::instrument(skip(dir), fields(file = T::FILE))]
pub fn load_table<T: GtfsRecord>(dir: &FeedDir) -> Result<Table<T>> {
    let Some(mut reader) = open_or_missing::<T>(dir)? else {
        return Ok(Table::default());
    };

    let mut rows = Vec::new();
    while let Some(row) = reader.next_row()? {
        rows.push(row);
    }

    info!(
        file = T::FILE,
        rows = rows.len(),
        skipped = reader.skipped(),
        "Loaded table"
    );
    Ok(Table {
        rows,
        skipped: reader.skipped(),
    })
}

fn open_or_missing<T: GtfsRecord>(dir: &FeedDir) -> Result<Option<RecordReader<T>>> {
    match RecordReader::<T>::open(dir) {
        Ok(Some(reader)) => Ok(Some(reader)),
        Ok(None) if T::REQUIRED => Err(GtfsError::missing_file(T::FILE)),
        Ok(None) => {
            let err = GtfsError::EmptyResult {
                what: format!("optional table {} not present", T::FILE),
            };
            warn!(error = %err, "Continuing without optional table");
            Ok(None)
        }
        Err(e @ GtfsError::MissingData { .. }) if !T::REQUIRED => {
            warn!(error = %e, "Ignoring optional table with unusable header");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// A table consumed in fixed-size batches. Single pass: once exhausted it
/// stays exhausted.
pub struct ChunkedTable<T> {
    reader: Option<RecordReader<T>>,
    chunk_size: usize,
    chunks: u64,
    rows_read: u64,
    skipped: u64,
}

impl<T: GtfsRecord> ChunkedTable<T> {
    /// Opens the table for batched reading. `chunk_size` of zero is treated as one.
    #[tracing::instrument(skip(dir), fields(file = T::FILE))]
    pub fn open(dir: &FeedDir, chunk_size: usize) -> Result<Self> {
        let reader = open_or_missing::<T>(dir)?;
        if reader.is_some() {
            info!(file = T::FILE, chunk_size, "Initialized chunked reading");
        }
        Ok(Self {
            reader,
            chunk_size: chunk_size.max(1),
            chunks: 0,
            rows_read: 0,
            skipped: 0,
        })
    }

    /// Reads the next batch of up to `chunk_size` rows. Returns `None` once
    /// the table is exhausted, at which point the file handle is closed.
    pub fn next_chunk(&mut self) -> Result<Option<Vec<T>>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let mut chunk = Vec::with_capacity(self.chunk_size);
        while chunk.len() < self.chunk_size {
            match reader.next_row()? {
                Some(row) => chunk.push(row),
                None => break,
            }
        }

        self.rows_read = reader.rows_read();
        self.skipped = reader.skipped();

        if chunk.is_empty() {
            // Drop the reader, and with it the file handle.
            self.reader = None;
            return Ok(None);
        }
        self.chunks += 1;
        Ok(Some(chunk))
    }

    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn is_exhausted(&self) -> bool {
        self.reader.is_none()
    }
}

impl<T: GtfsRecord> Iterator for ChunkedTable<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => None,
            Err(e) => {
                self.reader = None;
                Some(Err(e))
            }
        }
    }
}
