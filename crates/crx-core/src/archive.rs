//! Deterministic zip archival of an extension directory.
//!
//! Entries are visited depth-first in file-name order and every entry gets
//! the same timestamp and permissions, so an unchanged directory always
//! produces byte-identical output.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::config::PackConfig;
use crate::error::ArchiveError;

/// Name of the scratch archive inside the scratch directory.
pub const ARCHIVE_FILE_NAME: &str = "extension.zip";

/// A finished archive on disk.
///
/// Downstream stages only look at its path and length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePayload {
    path: PathBuf,
    size: u64,
}

impl ArchivePayload {
    /// Location of the archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Zip the contents of `source_dir` into `scratch_dir`/[`ARCHIVE_FILE_NAME`].
///
/// Entry names are relative to `source_dir` and use `/` separators.
/// Symlinks are skipped. Names starting with `.` are skipped unless
/// [`PackConfig::include_hidden`] is set.
///
/// # Errors
///
/// Returns [`ArchiveError::SourceNotFound`] if `source_dir` is not a
/// directory, and an I/O, traversal or zip error if anything fails while
/// reading sources or writing the archive.
pub fn create_archive(
    source_dir: &Path,
    scratch_dir: &Path,
    config: &PackConfig,
) -> Result<ArchivePayload, ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::SourceNotFound(source_dir.to_path_buf()));
    }

    let path = scratch_dir.join(ARCHIVE_FILE_NAME);
    let file = File::create(&path).map_err(io_error(&path))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    let timestamp = DateTime::default();
    let file_options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(timestamp)
        .unix_permissions(0o644);
    let dir_options = file_options.unix_permissions(0o755);

    let include_hidden = config.include_hidden;
    let walker = WalkDir::new(source_dir)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || include_hidden || !is_hidden(entry));

    let mut entries = 0;
    for entry in walker {
        let entry = entry?;
        let name = entry_name(source_dir, entry.path())?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            zip.add_directory(name, dir_options)?;
        } else if file_type.is_file() {
            zip.start_file(name, file_options)?;
            let mut source = File::open(entry.path()).map_err(io_error(entry.path()))?;
            io::copy(&mut source, &mut zip).map_err(io_error(entry.path()))?;
        } else {
            tracing::warn!("Skipping non-regular file {}", entry.path().display());
            continue;
        }
        entries += 1;
    }

    let mut out = zip.finish()?;
    out.flush().map_err(io_error(&path))?;
    drop(out);

    let size = fs::metadata(&path).map_err(io_error(&path))?.len();
    tracing::debug!(
        "Archived {entries} entries from {} ({size} bytes)",
        source_dir.display()
    );

    Ok(ArchivePayload { path, size })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn entry_name(root: &Path, path: &Path) -> Result<String, ArchiveError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| ArchiveError::NonUtf8Path(path.to_path_buf()))?;

    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError {
    let path = path.to_path_buf();
    move |source| ArchiveError::Io { path, source }
}
