//! Recursive scan of an export directory.

use std::ffi::OsStr;
use std::path::PathBuf;

use walkdir::WalkDir;

use super::{is_csv, verify_access, FileSource, RawFile, SourceError, TimestampSource};

pub struct DirectorySource {
    root: PathBuf,
    stamps: TimestampSource,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, stamps: TimestampSource) -> Self {
        DirectorySource {
            root: root.into(),
            stamps,
        }
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

impl FileSource for DirectorySource {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn available(&self) -> bool {
        verify_access(&self.root).is_ok()
    }

    fn list(&self) -> Result<Vec<RawFile>, SourceError> {
        verify_access(&self.root)?;

        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        let mut files = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_csv(entry.path()) {
                continue;
            }

            match RawFile::open(entry.path(), self.stamps) {
                Ok(Some(file)) => files.push(file),
                Ok(None) => {
                    tracing::debug!(path = %entry.path().display(), "no usable timestamp, ignoring file");
                }
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "failed to stat export");
                }
            }
        }

        tracing::debug!(root = %self.root.display(), count = files.len(), "listed exports");
        Ok(files)
    }
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn lists_nested_csv_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2025").join("08");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("20250820-080000.csv"), "a").unwrap();
        fs::write(nested.join("20250821-080000.CSV"), "b").unwrap();
        fs::write(nested.join("notes.txt"), "c").unwrap();

        let source = DirectorySource::new(dir.path(), TimestampSource::FileName);
        let mut names: Vec<String> = source.list().unwrap().into_iter().map(|f| f.name).collect();
        names.sort();

        assert_eq!(names, vec!["20250820-080000.csv", "20250821-080000.CSV"]);
    }

    #[test]
    fn skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".trash");
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("20250820-080000.csv"), "a").unwrap();

        let source = DirectorySource::new(dir.path(), TimestampSource::FileName);
        assert!(source.list().unwrap().is_empty());
    }

    #[test]
    fn file_name_stamps_drop_unparseable_names() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20250820-080000.csv"), "a").unwrap();
        fs::write(dir.path().join("export.csv"), "b").unwrap();

        let source = DirectorySource::new(dir.path(), TimestampSource::FileName);
        let files = source.list().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "20250820-080000.csv");
    }

    #[test]
    fn modified_stamps_keep_every_csv() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("export.csv"), "b").unwrap();

        let source = DirectorySource::new(dir.path(), TimestampSource::Modified);
        assert_eq!(source.list().unwrap().len(), 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path().join("gone"), TimestampSource::Modified);
        assert!(!source.available());
        assert!(matches!(source.list(), Err(SourceError::NotFound(_))));
    }
}
