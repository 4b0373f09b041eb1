//! Authoritative snapshot store.
//!
//! The whole hierarchy lives in one immutable [`Snapshot`]; mutations build
//! a new one, persist it as a single JSON document (temp file + rename) and
//! only then swap the shared pointer. Readers hold an `Arc` to whichever
//! snapshot was current when they asked and never see a mix.

use super::types::{Hierarchy, HierarchyBuilder, ImportCounts, Region, Subregion, SubregionMap};
use crate::error::{LocalityError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

/// One committed state of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Bumped on every commit; the cache keys its entries on it.
    pub version: u64,
    pub hierarchy: Hierarchy,
    pub counts: ImportCounts,
}

// On-disk layout: the three logical blobs plus the version stamp.
#[derive(Serialize)]
struct SnapshotFileRef<'a> {
    version: u64,
    regions: &'a [Region],
    subregions: &'a SubregionMap,
    counts: ImportCounts,
}

#[derive(Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    regions: Vec<Region>,
    #[serde(default)]
    subregions: SubregionMap,
}

pub struct LocalityStore {
    path: Option<PathBuf>,
    current: RwLock<Arc<Snapshot>>,
    // Serializes commits so version numbers and file writes stay ordered.
    writer: Mutex<()>,
}

impl LocalityStore {
    /// A store that lives only in memory (tests, one-shot CLI runs).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        }
    }

    /// Open a file-backed store. A missing file is an empty store; a
    /// corrupt one is logged and treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let snapshot = match Self::read_file(&path) {
            Ok(Some(s)) => s,
            Ok(None) => Snapshot::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable locality snapshot");
                Snapshot::default()
            }
        };
        Self {
            path: Some(path),
            current: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
        }
    }

    fn read_file(path: &Path) -> std::result::Result<Option<Snapshot>, String> {
        let data = match fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.to_string()),
        };
        let file: SnapshotFile = serde_json::from_str(&data).map_err(|e| e.to_string())?;

        let mut builder = HierarchyBuilder::new();
        for region in file.regions {
            builder.push_region(region);
        }
        for sub in file.subregions.into_values().flatten() {
            builder.push_subregion(sub);
        }
        let hierarchy = builder.build();
        let counts = hierarchy.counts();
        Ok(Some(Snapshot { version: file.version, hierarchy, counts }))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn version(&self) -> u64 {
        self.snapshot().version
    }

    pub fn regions(&self) -> Arc<Vec<Region>> {
        Arc::clone(self.snapshot().hierarchy.regions())
    }

    pub fn subregions(&self) -> Arc<SubregionMap> {
        Arc::clone(self.snapshot().hierarchy.subregions())
    }

    /// Subregions of `region_id`; empty for unknown or childless regions.
    pub fn subregions_of(&self, region_id: u32) -> Vec<Subregion> {
        self.snapshot().hierarchy.subregions_of(region_id).to_vec()
    }

    pub fn counts(&self) -> ImportCounts {
        self.snapshot().counts
    }

    /// Replace the entire snapshot. Returns the new version.
    pub fn replace_all(&self, hierarchy: Hierarchy, counts: ImportCounts) -> Result<u64> {
        let version = self.commit(hierarchy, counts)?;
        info!(version, regions = counts.regions, subregions = counts.subregions, "locality snapshot replaced");
        Ok(version)
    }

    /// Reset to the empty hierarchy and zero counts.
    pub fn clear(&self) -> Result<u64> {
        let version = self.commit(Hierarchy::default(), ImportCounts::default())?;
        info!(version, "locality snapshot cleared");
        Ok(version)
    }

    fn commit(&self, hierarchy: Hierarchy, counts: ImportCounts) -> Result<u64> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let version = self.version() + 1;
        let next = Snapshot { version, hierarchy, counts };

        if let Some(path) = &self.path {
            Self::persist(path, &next)?;
        }

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(version)
    }

    fn persist(path: &Path, snapshot: &Snapshot) -> Result<()> {
        let doc = SnapshotFileRef {
            version: snapshot.version,
            regions: snapshot.hierarchy.regions(),
            subregions: snapshot.hierarchy.subregions(),
            counts: snapshot.counts,
        };
        let json = serde_json::to_string_pretty(&doc).map_err(|e| LocalityError::Persist(e.to_string()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| LocalityError::Persist(format!("{}: {}", parent.display(), e)))?;
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| LocalityError::Persist(format!("{}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, path).map_err(|e| LocalityError::Persist(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Hierarchy {
        let mut b = HierarchyBuilder::new();
        b.push_region(Region { id: 16, name_latin: "Alger".into(), name_arabic: "الجزائر".into() });
        b.push_subregion(Subregion {
            id: 1601,
            region_id: 16,
            name_latin: "Alger Centre".into(),
            name_arabic: "الجزائر الوسطى".into(),
        });
        b.build()
    }

    #[test]
    fn test_empty_before_import() {
        let store = LocalityStore::in_memory();
        assert!(store.regions().is_empty());
        assert!(store.subregions_of(16).is_empty());
        assert_eq!(store.counts(), ImportCounts::default());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn test_replace_and_clear() {
        let store = LocalityStore::in_memory();
        let h = sample();
        let counts = h.counts();

        assert_eq!(store.replace_all(h, counts).unwrap(), 1);
        assert_eq!(store.regions().len(), 1);
        assert_eq!(store.subregions_of(16).len(), 1);
        assert_eq!(store.counts(), counts);

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.regions().is_empty());
        assert!(store.subregions_of(16).is_empty());
        assert_eq!(store.counts(), ImportCounts::default());
    }

    #[test]
    fn test_old_snapshot_unaffected_by_replace() {
        let store = LocalityStore::in_memory();
        let h = sample();
        store.replace_all(h.clone(), h.counts()).unwrap();

        let before = store.snapshot();
        store.clear().unwrap();

        assert_eq!(before.hierarchy.regions().len(), 1);
        assert!(store.snapshot().hierarchy.is_empty());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("localities.json");

        {
            let store = LocalityStore::open(&path);
            let h = sample();
            store.replace_all(h.clone(), h.counts()).unwrap();
        }

        let reopened = LocalityStore::open(&path);
        assert_eq!(reopened.version(), 1);
        assert_eq!(reopened.regions()[0].name_arabic, "الجزائر");
        assert_eq!(reopened.subregions_of(16)[0].id, 1601);
        assert_eq!(reopened.counts(), ImportCounts { regions: 1, subregions: 1 });
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("localities.json");
        fs::write(&path, "{ not json").unwrap();

        let store = LocalityStore::open(&path);
        assert!(store.regions().is_empty());
    }

    #[test]
    fn test_failed_persist_keeps_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("localities.json");
        let store = LocalityStore::open(&path);
        let h = sample();
        store.replace_all(h.clone(), h.counts()).unwrap();

        // A non-empty directory where the blob should be makes the rename fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = store.clear().unwrap_err();
        assert!(matches!(err, LocalityError::Persist(_)));
        assert_eq!(store.regions().len(), 1);
        assert_eq!(store.version(), 1);
    }
}
