use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cli::SourceArgs;
use crate::engine::shift::{ScheduleError, ShiftLabel, ShiftSchedule};
use crate::source::{DirectorySource, FileSource, ManualSource, TimestampSource};

pub const DEFAULT_MAX_FILES: usize = 240;
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(15 * 60);
const SNAPSHOTS_PER_DAY: usize = 24;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid shift schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("invalid watch interval '{value}': {source}")]
    Interval {
        value: String,
        #[source]
        source: humantime::DurationError,
    },

    #[error("no export directory given; pass --dir or --files")]
    NoSource,
}

/// On-disk config, every field optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub source: SourceSection,
    pub shifts: ShiftSection,
    pub trend: TrendSection,
    pub watch: WatchSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    pub dir: Option<PathBuf>,
    pub timestamp: Option<TimestampSource>,
    pub max_files: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShiftSection {
    pub morning_start: Option<u32>,
    pub afternoon_start: Option<u32>,
    pub night_start: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrendSection {
    pub max_days: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchSection {
    pub interval: Option<String>,
}

impl FileConfig {
    /// `<config dir>/rollwatch/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rollwatch").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Load an explicit path, or the default path when it exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Values saved by earlier runs, consulted when neither flags nor the
/// config file set them.
#[derive(Debug, Default, Clone)]
pub struct Remembered {
    pub directory: Option<PathBuf>,
    pub max_files: Option<usize>,
}

/// Which exports the engine should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Directory(PathBuf),
    Files(Vec<PathBuf>),
    Unset,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub selection: Selection,
    pub stamps: TimestampSource,
    pub schedule: ShiftSchedule,
    pub max_files: usize,
    pub max_days: usize,
    pub watch_interval: Duration,
    pub json_output: bool,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            selection: Selection::Unset,
            stamps: TimestampSource::default(),
            schedule: ShiftSchedule::default(),
            max_files: DEFAULT_MAX_FILES,
            max_days: days_for_files(DEFAULT_MAX_FILES),
            watch_interval: DEFAULT_WATCH_INTERVAL,
            json_output: false,
            verbose: false,
        }
    }
}

/// Roughly one export per hour: 24 files make a day, bounded to 1..=100 days.
pub fn days_for_files(max_files: usize) -> usize {
    (max_files / SNAPSHOTS_PER_DAY).clamp(1, 100)
}

impl Config {
    /// Merge command line flags over the config file, falling back to what
    /// earlier runs remembered.
    pub fn from_args(args: &SourceArgs, file: FileConfig, remembered: Remembered) -> Result<Self, ConfigError> {
        let selection = if let Some(files) = args.files.clone().filter(|f| !f.is_empty()) {
            Selection::Files(files)
        } else if let Some(dir) = args.dir.clone().or(file.source.dir).or(remembered.directory) {
            Selection::Directory(dir)
        } else {
            Selection::Unset
        };

        let defaults = ShiftSchedule::default();
        let schedule = ShiftSchedule::new(
            file.shifts.morning_start.unwrap_or(defaults.start_of(ShiftLabel::Morning)),
            file.shifts.afternoon_start.unwrap_or(defaults.start_of(ShiftLabel::Afternoon)),
            file.shifts.night_start.unwrap_or(defaults.start_of(ShiftLabel::Night)),
        )?;

        let max_files = args
            .max_files
            .or(file.source.max_files)
            .or(remembered.max_files)
            .unwrap_or(DEFAULT_MAX_FILES)
            .max(1);
        let max_days = args
            .days
            .or(file.trend.max_days)
            .unwrap_or_else(|| days_for_files(max_files));

        let watch_interval = match file.watch.interval {
            Some(value) => parse_interval(&value)?,
            None => DEFAULT_WATCH_INTERVAL,
        };

        Ok(Config {
            selection,
            stamps: args
                .timestamp
                .map(TimestampSource::from)
                .or(file.source.timestamp)
                .unwrap_or_default(),
            schedule,
            max_files,
            max_days,
            watch_interval,
            json_output: args.json,
            verbose: args.verbose,
        })
    }

    /// Build the file source for this run. Called once per scan cycle.
    pub fn file_source(&self) -> Result<Box<dyn FileSource + Send>, ConfigError> {
        match &self.selection {
            Selection::Directory(dir) => Ok(Box::new(DirectorySource::new(dir.clone(), self.stamps))),
            Selection::Files(files) => Ok(Box::new(ManualSource::new(files.clone(), self.stamps))),
            Selection::Unset => Err(ConfigError::NoSource),
        }
    }

    pub fn directory(&self) -> Option<&Path> {
        match &self.selection {
            Selection::Directory(dir) => Some(dir),
            _ => None,
        }
    }

    /// Human description of where exports come from, stored with history.
    pub fn describe_source(&self) -> String {
        match &self.selection {
            Selection::Directory(dir) => dir.display().to_string(),
            Selection::Files(files) => format!("{} selected files", files.len()),
            Selection::Unset => "none".to_string(),
        }
    }
}

pub fn parse_interval(value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|source| ConfigError::Interval {
        value: value.to_string(),
        source,
    })
}
