use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::AppResult;
use crate::geocode::Coordinate;

/// Run-scoped geocode results keyed by the trimmed raw address.
///
/// Only successful lookups are stored, so a failing address is retried on
/// the next run. Within a run the first result stored for a key wins.
#[derive(Debug)]
pub struct GeocodeCache {
    path: PathBuf,
    entries: BTreeMap<String, Coordinate>,
    inserted: usize,
}

impl GeocodeCache {
    /// Loads the cache file. A missing or unreadable file yields an empty
    /// cache rather than an error.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, Coordinate>>(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(
                        target: "geocode_cache",
                        path = %path.display(),
                        error = %err,
                        "cache file is not valid; starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(target: "geocode_cache", path = %path.display(), "no cache file yet");
                BTreeMap::new()
            }
            Err(err) => {
                warn!(
                    target: "geocode_cache",
                    path = %path.display(),
                    error = %err,
                    "cache file unreadable; starting empty"
                );
                BTreeMap::new()
            }
        };

        info!(
            target: "geocode_cache",
            path = %path.display(),
            entries = entries.len(),
            "geocode cache loaded"
        );
        Self {
            path,
            entries,
            inserted: 0,
        }
    }

    pub fn key(raw_address: &str) -> &str {
        raw_address.trim()
    }

    pub fn get(&self, raw_address: &str) -> Option<Coordinate> {
        self.entries.get(Self::key(raw_address)).copied()
    }

    /// Stores a result unless the key already has one. Returns whether the
    /// entry was written.
    pub fn insert(&mut self, raw_address: &str, coordinate: Coordinate) -> bool {
        let key = Self::key(raw_address);
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), coordinate);
        self.inserted += 1;
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries added since the cache was loaded.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&self) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, serialized)?;
        debug!(
            target: "geocode_cache",
            path = %self.path.display(),
            entries = self.entries.len(),
            "geocode cache written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const KUTA: Coordinate = Coordinate {
        lat: -8.72,
        lon: 115.17,
    };

    #[test]
    fn missing_or_corrupt_file_starts_empty() {
        let dir = tempdir().unwrap();
        let missing = GeocodeCache::load(dir.path().join("absent.json"));
        assert!(missing.is_empty());

        let corrupt_path = dir.path().join("corrupt.json");
        fs::write(&corrupt_path, "{ not json").unwrap();
        let corrupt = GeocodeCache::load(&corrupt_path);
        assert!(corrupt.is_empty());
    }

    #[test]
    fn keys_on_trimmed_raw_text() {
        let dir = tempdir().unwrap();
        let mut cache = GeocodeCache::load(dir.path().join("cache.json"));
        assert!(cache.insert("  Jl. Legian 10, Kuta ", KUTA));
        assert_eq!(cache.get("Jl. Legian 10, Kuta"), Some(KUTA));
        assert_eq!(cache.get("Jalan Legian 10, Kuta"), None);
    }

    #[test]
    fn first_result_for_a_key_wins() {
        let dir = tempdir().unwrap();
        let mut cache = GeocodeCache::load(dir.path().join("cache.json"));
        assert!(cache.insert("Jl. Legian 10", KUTA));
        let later = Coordinate { lat: 0.0, lon: 0.0 };
        assert!(!cache.insert("Jl. Legian 10", later));
        assert_eq!(cache.get("Jl. Legian 10"), Some(KUTA));
        assert_eq!(cache.inserted(), 1);
    }

    #[test]
    fn flush_writes_a_flat_json_object() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");
        let mut cache = GeocodeCache::load(&path);
        cache.insert("Jl. Legian 10, Kuta", KUTA);
        cache.flush().unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            written,
            serde_json::json!({ "Jl. Legian 10, Kuta": { "lat": -8.72, "lon": 115.17 } })
        );

        let reloaded = GeocodeCache::load(&path);
        assert_eq!(reloaded.get("Jl. Legian 10, Kuta"), Some(KUTA));
        assert_eq!(reloaded.inserted(), 0);
    }

    #[test]
    fn flush_reports_write_failures() {
        let dir = tempdir().unwrap();
        let cache = GeocodeCache::load(dir.path());
        assert!(cache.flush().is_err());
    }
}
