//! Snapshot file access.
//!
//! The engine never touches the filesystem directly. It asks a `FileSource`
//! for the current set of exports and reads each `RawFile` on demand:
//! - `DirectorySource` walks an export folder recursively
//! - `ManualSource` wraps an explicit list of files picked by the user
//!
//! Every file is resolved to exactly one local wall-clock timestamp when it is
//! listed, either from its modification time or from a `YYYYMMDD-HHMMSS` stem
//! embedded in its name. Files whose timestamp cannot be resolved are left out.

pub mod directory;
pub mod manual;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use directory::DirectorySource;
pub use manual::ManualSource;

const FILE_STAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("cannot read {}: {source}", path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Where a file's snapshot time comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampSource {
    /// Filesystem modification time, converted to local time.
    #[default]
    Modified,
    /// `YYYYMMDD-HHMMSS` stem of the file name, read as local time.
    #[serde(rename = "filename")]
    FileName,
}

impl TimestampSource {
    /// Resolve the snapshot time of the file at `path`.
    ///
    /// `Ok(None)` means the file exists but carries no usable timestamp.
    pub fn resolve(self, path: &Path) -> io::Result<Option<NaiveDateTime>> {
        match self {
            TimestampSource::Modified => {
                let modified = fs::metadata(path)?.modified()?;
                let local: DateTime<Local> = modified.into();
                Ok(Some(local.naive_local()))
            }
            TimestampSource::FileName => Ok(path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(parse_file_stamp)),
        }
    }
}

/// Parse the `YYYYMMDD-HHMMSS` stem of an export name such as
/// `20250821-230324.csv`.
pub fn parse_file_stamp(name: &str) -> Option<NaiveDateTime> {
    let stem = name.split('.').next()?;
    NaiveDateTime::parse_from_str(stem, FILE_STAMP_FORMAT).ok()
}

#[derive(Debug, Clone)]
enum Content {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

/// One snapshot export as handed to the engine.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    /// Local wall-clock time the snapshot was taken.
    pub timestamp: NaiveDateTime,
    content: Content,
}

impl RawFile {
    pub fn from_path(path: impl Into<PathBuf>, timestamp: NaiveDateTime) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        RawFile {
            name,
            timestamp,
            content: Content::Path(path),
        }
    }

    /// In-memory export, used for uploads and tests.
    pub fn from_bytes(name: impl Into<String>, timestamp: NaiveDateTime, bytes: impl Into<Vec<u8>>) -> Self {
        RawFile {
            name: name.into(),
            timestamp,
            content: Content::Bytes(Arc::from(bytes.into())),
        }
    }

    /// Stat `path` and resolve its timestamp with `stamps`.
    pub fn open(path: &Path, stamps: TimestampSource) -> io::Result<Option<Self>> {
        if !fs::metadata(path)?.is_file() {
            return Ok(None);
        }

        Ok(stamps
            .resolve(path)?
            .map(|timestamp| RawFile::from_path(path, timestamp)))
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.content {
            Content::Path(p) => Some(p),
            Content::Bytes(_) => None,
        }
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        match &self.content {
            Content::Path(p) => fs::read(p),
            Content::Bytes(b) => Ok(b.to_vec()),
        }
    }
}

/// Capability to enumerate snapshot exports.
///
/// Picked once at startup; the engine never branches on which one it got.
pub trait FileSource {
    fn name(&self) -> &'static str;
    fn available(&self) -> bool;
    fn list(&self) -> Result<Vec<RawFile>, SourceError>;
}

/// Check that `path` is a directory this process may list.
pub fn verify_access(path: &Path) -> Result<(), SourceError> {
    let metadata = fs::metadata(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
        _ => SourceError::PermissionDenied {
            path: path.to_path_buf(),
            source,
        },
    })?;

    if !metadata.is_dir() {
        return Err(SourceError::NotADirectory(path.to_path_buf()));
    }

    fs::read_dir(path).map_err(|source| SourceError::PermissionDenied {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(())
}

/// Sort files most recent first. Equal timestamps fall back to name order so
/// the result does not depend on listing order.
pub fn newest_first(files: &[RawFile]) -> Vec<&RawFile> {
    let mut ordered: Vec<&RawFile> = files.iter().collect();
    ordered.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.name.cmp(&a.name))
    });
    ordered
}

pub(crate) fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 8, day)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
            .unwrap()
    }

    #[test]
    fn parses_stamp_from_export_name() {
        let parsed = parse_file_stamp("20250821-230324.csv").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(2025, 8, 21).unwrap().and_hms_opt(23, 3, 24).unwrap());
    }

    #[test]
    fn rejects_names_without_stamp() {
        assert!(parse_file_stamp("inventario.csv").is_none());
        assert!(parse_file_stamp("20250821.csv").is_none());
        assert!(parse_file_stamp("20251321-230324.csv").is_none());
    }

    #[test]
    fn file_name_source_reads_stem() {
        let path = Path::new("/exports/20250101-061500.csv");
        let resolved = TimestampSource::FileName.resolve(path).unwrap();
        assert_eq!(resolved, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(6, 15, 0));
    }

    #[test]
    fn newest_first_breaks_ties_by_name() {
        let files = vec![
            RawFile::from_bytes("a.csv", at(1, 8), ""),
            RawFile::from_bytes("c.csv", at(2, 8), ""),
            RawFile::from_bytes("b.csv", at(1, 8), ""),
        ];

        let names: Vec<&str> = newest_first(&files).iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["c.csv", "b.csv", "a.csv"]);
    }

    #[test]
    fn csv_extension_is_case_insensitive() {
        assert!(is_csv(Path::new("x/20250101-000000.CSV")));
        assert!(is_csv(Path::new("x.csv")));
        assert!(!is_csv(Path::new("x.txt")));
        assert!(!is_csv(Path::new("csv")));
    }

    #[test]
    fn verify_access_rejects_missing_and_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(verify_access(dir.path()).is_ok());

        let missing = dir.path().join("nope");
        assert!(matches!(verify_access(&missing), Err(SourceError::NotFound(_))));

        let file = dir.path().join("a.csv");
        fs::write(&file, "x").unwrap();
        assert!(matches!(verify_access(&file), Err(SourceError::NotADirectory(_))));
    }

    #[test]
    fn in_memory_file_reads_back() {
        let file = RawFile::from_bytes("mem.csv", at(3, 3), "ROLL_ID\n1\n");
        assert!(file.path().is_none());
        assert_eq!(file.read().unwrap(), b"ROLL_ID\n1\n");
    }
}
