//! Feed archive extraction.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{info, warn};
use zip::ZipArchive;

use crate::error::Result;

/// Unpacks a GTFS zip into `dest` and returns the directory holding the
/// tables.
///
/// Feeds are sometimes zipped with all tables inside one top-level folder;
/// that folder is stripped so the tables land directly in `dest`. Entries
/// whose path would escape `dest` are skipped.
#[tracing::instrument(skip_all, fields(zip = %zip_path.as_ref().display(), dest = %dest.as_ref().display()))]
pub fn extract(zip_path: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<PathBuf> {
    let dest = dest.as_ref();
    let mut archive = ZipArchive::new(File::open(zip_path.as_ref())?)?;

    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i)?;
        if file.is_dir() {
            continue;
        }
        match file.enclosed_name() {
            Some(path) => entries.push((i, path)),
            None => warn!(entry = file.name(), "Skipping archive entry with unsafe path"),
        }
    }

    let prefix = shared_top_dir(entries.iter().map(|(_, p)| p.as_path()));
    fs::create_dir_all(dest)?;

    let mut extracted = 0usize;
    for (i, path) in entries {
        let relative = match &prefix {
            Some(prefix) => path.strip_prefix(prefix).unwrap_or(&path).to_path_buf(),
            None => path,
        };
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = archive.by_index(i)?;
        let mut out = File::create(&target)?;
        io::copy(&mut file, &mut out)?;
        extracted += 1;
    }

    if extracted == 0 {
        warn!("Archive contained no files");
    }
    info!(
        files = extracted,
        flattened = prefix.is_some(),
        "Extracted feed archive"
    );
    Ok(dest.to_path_buf())
}

/// The single top-level directory every path sits under, if there is one.
fn shared_top_dir<'a>(paths: impl Iterator<Item = &'a Path>) -> Option<PathBuf> {
    let mut shared: Option<PathBuf> = None;
    for path in paths {
        let mut components = path.components();
        let first = match components.next() {
            Some(Component::Normal(first)) => first,
            _ => return None,
        };
        // A file at the root means there is nothing to strip.
        components.next()?;
        match &shared {
            None => shared = Some(PathBuf::from(first)),
            Some(dir) if dir.as_os_str() == first => {}
            Some(_) => return None,
        }
    }
    shared
}
