//! Bar storage as JSON files on disk.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use trendbar_types::{BarInstance, BarRecord, Instrument, Period};
use uuid::Uuid;

use crate::{BarStore, Result, StoreError};

/// Stores each bar as a pretty-printed JSON document.
///
/// Bars live under `<base>/bars/<INSTRUMENT>/<period>/<start>.json`, where
/// `<start>` is the period start in epoch milliseconds. Saving the same bar
/// window twice overwrites the earlier document.
#[derive(Debug, Clone)]
pub struct FileBarStore {
    /// Base directory for storage.
    base_path: PathBuf,
    /// Directory holding the per-instrument bar trees.
    bars_path: PathBuf,
}

impl FileBarStore {
    /// Creates a store rooted at `base_path`.
    ///
    /// Creates the bars directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new(base_path: PathBuf) -> Result<Self> {
        let bars_path = base_path.join("bars");
        create_dir(&bars_path)?;

        Ok(Self {
            base_path,
            bars_path,
        })
    }

    /// Returns the default path for trendbar storage.
    ///
    /// Uses the `directories` crate to find the appropriate location:
    /// - Linux: `~/.local/share/trendbar/`
    /// - macOS: `~/Library/Application Support/trendbar/`
    /// - Windows: `C:\Users\<User>\AppData\Roaming\trendbar\`
    ///
    /// Falls back to `~/.trendbar/` if the platform-specific location
    /// cannot be determined.
    #[must_use]
    pub fn default_path() -> PathBuf {
        ProjectDirs::from("", "", "trendbar").map_or_else(dirs_fallback, |proj_dirs| {
            proj_dirs.data_dir().to_path_buf()
        })
    }

    /// Creates a store at the default path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn with_default_path() -> Result<Self> {
        Self::new(Self::default_path())
    }

    /// Returns the base path for storage.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the directory holding bars of one instrument and period.
    #[must_use]
    pub fn series_path(&self, instrument: Instrument, period: Period) -> PathBuf {
        self.bars_path
            .join(instrument.to_string())
            .join(period.as_str())
    }

    /// Returns the path of the document for a bar window.
    #[must_use]
    pub fn bar_path(&self, instance: &BarInstance) -> PathBuf {
        self.series_path(instance.key.instrument, instance.key.period)
            .join(format!("{}.json", instance.period_start.timestamp_millis()))
    }

    fn load(path: &Path) -> Result<BarRecord> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;

        serde_json::from_str(&content).map_err(|e| StoreError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

impl BarStore for FileBarStore {
    fn save(&self, record: BarRecord) -> Result<BarRecord> {
        let record = match record.id {
            Some(_) => record,
            None => record.with_id(Uuid::new_v4()),
        };

        create_dir(&self.series_path(record.instrument, record.period))?;
        let path = self.bar_path(&record.instance());
        let json = serde_json::to_string_pretty(&record)?;

        fs::write(&path, json).map_err(|e| StoreError::WriteFile { path, source: e })?;
        Ok(record)
    }

    fn find_range(
        &self,
        instrument: Instrument,
        period: Period,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BarRecord>> {
        let dir = self.series_path(instrument, period);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| StoreError::ReadDir {
            path: dir.clone(),
            source: e,
        })?;

        let (from, to) = (from.timestamp_millis(), to.timestamp_millis());
        let mut bars = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StoreError::ReadDir {
                path: dir.clone(),
                source: e,
            })?;

            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            let Some(start) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<i64>().ok())
            else {
                continue;
            };
            if start < from || start > to {
                continue;
            }

            match Self::load(&path) {
                Ok(bar) => bars.push(bar),
                Err(e) => {
                    // don't fail the whole query on one corrupt file
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable bar");
                }
            }
        }

        bars.sort_by_key(|bar| bar.period_start);
        Ok(bars)
    }
}

fn create_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| StoreError::CreateDir {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

/// Fallback for determining home directory.
fn dirs_fallback() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".trendbar")
}
