//! Explicit file selection, for environments where the export folder cannot
//! be scanned and the user hands over individual files instead.

use std::path::PathBuf;

use super::{is_csv, FileSource, RawFile, SourceError, TimestampSource};

pub struct ManualSource {
    paths: Vec<PathBuf>,
    stamps: TimestampSource,
}

impl ManualSource {
    pub fn new(paths: Vec<PathBuf>, stamps: TimestampSource) -> Self {
        ManualSource { paths, stamps }
    }
}

impl FileSource for ManualSource {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn available(&self) -> bool {
        true
    }

    fn list(&self) -> Result<Vec<RawFile>, SourceError> {
        let mut files = Vec::with_capacity(self.paths.len());

        for path in &self.paths {
            if !is_csv(path) {
                tracing::debug!(path = %path.display(), "not a csv export, ignoring");
                continue;
            }

            match RawFile::open(path, self.stamps) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "no usable timestamp, ignoring file");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping selected file");
                }
            }
        }

        Ok(files)
    }
}
