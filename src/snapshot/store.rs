use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::flight::{normalize_record, Direction, FlightRecord, Snapshot};

pub const DEFAULT_DEPARTURE_FILE: &str = "last_departure_cache.json";
pub const DEFAULT_ARRIVAL_FILE: &str = "last_arrival_cache.json";

/// Last-seen snapshot per direction, one JSON file each. Assumes a single
/// writer; there is no locking.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
    departure_file: String,
    arrival_file: String,
}

impl SnapshotCache {
    pub fn new(
        dir: impl Into<PathBuf>,
        departure_file: impl Into<String>,
        arrival_file: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            departure_file: departure_file.into(),
            arrival_file: arrival_file.into(),
        }
    }

    pub fn with_default_files(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, DEFAULT_DEPARTURE_FILE, DEFAULT_ARRIVAL_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, direction: Direction) -> PathBuf {
        let file = match direction {
            Direction::Departure => &self.departure_file,
            Direction::Arrival => &self.arrival_file,
        };
        self.dir.join(file)
    }

    /// `Ok(None)` when no cache file exists yet.
    pub fn load(&self, direction: Direction) -> Result<Option<Snapshot>, CacheError> {
        let path = self.path_for(direction);
        if !path.exists() {
            debug!("no {} cache at {}", direction.as_slug(), path.display());
            return Ok(None);
        }
        let data = fs::read_to_string(&path).map_err(|source| CacheError::Read {
            path: path.clone(),
            source,
        })?;
        let snapshot: Snapshot =
            serde_json::from_str(&data).map_err(|source| CacheError::Parse { path, source })?;
        Ok(Some(snapshot))
    }

    /// Unreadable or corrupt caches count as missing, which makes the caller
    /// treat the run as a baseline.
    pub fn load_or_baseline(&self, direction: Direction) -> Option<Snapshot> {
        match self.load(direction) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("ignoring {} cache: {err}", direction.as_slug());
                None
            }
        }
    }

    pub fn save(&self, direction: Direction, snapshot: &[FlightRecord]) -> Result<(), CacheError> {
        let path = self.path_for(direction);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                path: path.clone(),
                source,
            })?;
        }
        let cleaned = snapshot.iter().map(normalize_record).collect::<Vec<_>>();
        let json = serde_json::to_string_pretty(&cleaned).map_err(|source| {
            CacheError::Serialize {
                path: path.clone(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;
        info!(
            "saved {} {} records to {}",
            cleaned.len(),
            direction.as_slug(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::FieldValue;

    fn sample() -> Vec<FlightRecord> {
        vec![
            FlightRecord::new("KE123", "20251101").with_times(Some("10:00"), None),
            FlightRecord::new("OZ456", "20251101").with_times(Some("11:30"), Some("11:45")),
        ]
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::with_default_files(dir.path());
        assert!(cache.load(Direction::Departure).expect("load").is_none());
        assert!(cache.load_or_baseline(Direction::Arrival).is_none());
    }

    #[test]
    fn directions_use_independent_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::with_default_files(dir.path());
        cache.save(Direction::Departure, &sample()).expect("save");

        assert_eq!(
            cache.load(Direction::Departure).expect("load"),
            Some(sample())
        );
        assert!(cache.load(Direction::Arrival).expect("load").is_none());
        assert_ne!(
            cache.path_for(Direction::Departure),
            cache.path_for(Direction::Arrival)
        );
    }

    #[test]
    fn save_normalizes_sentinels_to_null() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::with_default_files(dir.path());
        let mut record = FlightRecord::new("KE123", "20251101").with_times(Some("10:00"), Some("NaN"));
        record
            .details
            .insert("gate".to_string(), Some(FieldValue::Number(f64::NAN)));
        cache.save(Direction::Departure, &[record]).expect("save");

        let raw = fs::read_to_string(cache.path_for(Direction::Departure)).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert!(value[0]["actual_time"].is_null());
        assert!(value[0]["gate"].is_null());
        assert!(raw.contains('\n'), "cache should be indented");
    }

    #[test]
    fn corrupt_cache_is_an_error_but_collapses_to_baseline() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = SnapshotCache::with_default_files(dir.path());
        fs::write(cache.path_for(Direction::Arrival), "{ not json").expect("write");

        assert!(matches!(
            cache.load(Direction::Arrival),
            Err(CacheError::Parse { .. })
        ));
        assert!(cache.load_or_baseline(Direction::Arrival).is_none());
    }

    #[test]
    fn save_creates_missing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("log").join("cache");
        let cache = SnapshotCache::with_default_files(&nested);
        cache.save(Direction::Arrival, &sample()).expect("save");
        assert!(nested.join(DEFAULT_ARRIVAL_FILE).exists());
    }
}
