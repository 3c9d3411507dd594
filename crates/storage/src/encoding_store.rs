//! Encoding Map Store
//!
//! Holds the current `EncodingMap` as an immutable snapshot. Readers clone the
//! `Arc`; a reload or training run builds the complete replacement first and
//! only then swaps the pointer, so a reader sees either the old or the new map.

use feature_engine::{EncodingMap, ENCODING_FORMAT_VERSION};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::artifact::{read_json, write_json_atomic};
use crate::StorageError;

/// Persisted encoding map with an atomically swapped in-memory snapshot
pub struct EncodingStore {
    path: PathBuf,
    current: RwLock<Option<Arc<EncodingMap>>>,
    generation: AtomicU64,
}

impl EncodingStore {
    /// Create a store backed by `path` without reading it
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a store and load the persisted map if one exists
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let store = Self::new(path);
        store.reload()?;
        Ok(store)
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of maps installed so far
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current map, `None` before the first training run
    pub fn snapshot(&self) -> Result<Option<Arc<EncodingMap>>, StorageError> {
        let current = self
            .current
            .read()
            .map_err(|e| StorageError::Lock(format!("{}", e)))?;
        Ok(current.clone())
    }

    /// Re-read the persisted map and install it.
    ///
    /// A missing file leaves the current snapshot untouched and returns `None`.
    pub fn reload(&self) -> Result<Option<Arc<EncodingMap>>, StorageError> {
        let Some(map) = read_json::<EncodingMap>(&self.path)? else {
            warn!("No encoding map at {} yet", self.path.display());
            return Ok(None);
        };

        if map.format_version != ENCODING_FORMAT_VERSION {
            return Err(StorageError::IncompatibleFormat {
                found: map.format_version,
                expected: ENCODING_FORMAT_VERSION,
            });
        }

        info!(
            "Loaded encoding map from {} (fingerprint {}, {} entries)",
            self.path.display(),
            map.fingerprint,
            map.len()
        );
        let map = Arc::new(map);
        self.install(Arc::clone(&map))?;
        Ok(Some(map))
    }

    /// Persist a freshly fitted map, overwriting the previous file, then install it
    pub fn persist(&self, map: EncodingMap) -> Result<Arc<EncodingMap>, StorageError> {
        write_json_atomic(&self.path, &map)?;
        info!(
            "Persisted encoding map to {} (fingerprint {})",
            self.path.display(),
            map.fingerprint
        );
        let map = Arc::new(map);
        self.install(Arc::clone(&map))?;
        Ok(map)
    }

    /// Swap in a complete map, returning the new generation
    pub fn install(&self, map: Arc<EncodingMap>) -> Result<u64, StorageError> {
        let mut current = self
            .current
            .write()
            .map_err(|e| StorageError::Lock(format!("{}", e)))?;
        *current = Some(map);
        Ok(self.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feature_engine::EncodingMapBuilder;

    fn fitted(targets: &[f64]) -> EncodingMap {
        let mut builder = EncodingMapBuilder::new(targets.len());
        builder
            .fit_column("TIPOVUELO", &["I", "N"], targets)
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_first_run_has_no_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncodingStore::open(dir.path().join("encodings.json")).unwrap();
        assert!(store.snapshot().unwrap().is_none());
        assert_eq!(store.generation(), 0);
    }

    #[test]
    fn test_persist_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.json");
        let map = fitted(&[12.0, 4.0]);

        let store = EncodingStore::new(&path);
        store.persist(map.clone()).unwrap();

        let reopened = EncodingStore::open(&path).unwrap();
        let snapshot = reopened.snapshot().unwrap().unwrap();
        assert_eq!(*snapshot, map);
        assert_eq!(snapshot.lookup("TIPOVUELO", "I").unwrap(), 12.0);
    }

    #[test]
    fn test_persist_overwrites_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncodingStore::new(dir.path().join("encodings.json"));
        store.persist(fitted(&[1.0, 2.0])).unwrap();
        let second = store.persist(fitted(&[3.0, 4.0])).unwrap();

        let reloaded = store.reload().unwrap().unwrap();
        assert_eq!(reloaded.fingerprint, second.fingerprint);
        assert_eq!(store.generation(), 3);
    }

    #[test]
    fn test_held_snapshot_survives_swap() {
        let dir = tempfile::tempdir().unwrap();
        let store = EncodingStore::new(dir.path().join("encodings.json"));
        store.persist(fitted(&[1.0, 2.0])).unwrap();

        let held = store.snapshot().unwrap().unwrap();
        store.persist(fitted(&[5.0, 6.0])).unwrap();

        assert_eq!(held.lookup("TIPOVUELO", "I").unwrap(), 1.0);
        let fresh = store.snapshot().unwrap().unwrap();
        assert_eq!(fresh.lookup("TIPOVUELO", "I").unwrap(), 5.0);
    }

    #[test]
    fn test_incompatible_format_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encodings.json");
        let mut map = fitted(&[1.0, 2.0]);
        map.format_version = ENCODING_FORMAT_VERSION + 1;
        write_json_atomic(&path, &map).unwrap();

        let store = EncodingStore::new(&path);
        assert!(matches!(
            store.reload(),
            Err(StorageError::IncompatibleFormat { .. })
        ));
        assert!(store.snapshot().unwrap().is_none());
    }
}
