//! Cluster persistence collaborators

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::ClusterSet;
use crate::error::StoreError;

/// Persistence for built cluster sets, keyed by tile set id.
pub trait ClusterStore: Send + Sync {
    fn save(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError>;
    fn load(&self, tile_set_id: &str) -> Result<ClusterSet, StoreError>;
    /// Replaces an existing entry; fails with `NotFound` if nothing was saved.
    fn update(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError>;
}

/// In-process store, also used by tests to observe writes.
#[derive(Default)]
pub struct MemoryClusterStore {
    entries: Mutex<HashMap<String, ClusterSet>>,
    saves: AtomicUsize,
    updates: AtomicUsize,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn contains(&self, tile_set_id: &str) -> bool {
        self.entries
            .lock()
            .expect("cluster store lock poisoned")
            .contains_key(tile_set_id)
    }
}

impl ClusterStore for MemoryClusterStore {
    fn save(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
        self.entries
            .lock()
            .expect("cluster store lock poisoned")
            .insert(tile_set_id.to_string(), clusters.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load(&self, tile_set_id: &str) -> Result<ClusterSet, StoreError> {
        self.entries
            .lock()
            .expect("cluster store lock poisoned")
            .get(tile_set_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(tile_set_id.to_string()))
    }

    fn update(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("cluster store lock poisoned");
        let entry = entries
            .get_mut(tile_set_id)
            .ok_or_else(|| StoreError::NotFound(tile_set_id.to_string()))?;
        *entry = clusters.clone();
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredClusters {
    tile_set_id: String,
    saved_at: DateTime<Utc>,
    clusters: ClusterSet,
}

/// One JSON document per tile set under a directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, tile_set_id: &str) -> PathBuf {
        let file_stem: String = tile_set_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file_stem}.clusters.json"))
    }

    /// Time of the last write for `tile_set_id`.
    pub fn saved_at(&self, tile_set_id: &str) -> Result<DateTime<Utc>, StoreError> {
        Ok(self.read(tile_set_id)?.saved_at)
    }

    fn read(&self, tile_set_id: &str) -> Result<StoredClusters, StoreError> {
        let path = self.path_for(tile_set_id);
        if !path.exists() {
            return Err(StoreError::NotFound(tile_set_id.to_string()));
        }
        let text = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn write(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
        let path = self.path_for(tile_set_id);
        let document = StoredClusters {
            tile_set_id: tile_set_id.to_string(),
            saved_at: Utc::now(),
            clusters: clusters.clone(),
        };
        let json = serde_json::to_string(&document)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &path)?;
        debug!(tile_set_id, path = %path.display(), clusters = clusters.len(), "clusters written");
        Ok(())
    }
}

impl ClusterStore for JsonFileStore {
    fn save(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
        self.write(tile_set_id, clusters)
    }

    fn load(&self, tile_set_id: &str) -> Result<ClusterSet, StoreError> {
        Ok(self.read(tile_set_id)?.clusters)
    }

    fn update(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
        if !self.path_for(tile_set_id).exists() {
            return Err(StoreError::NotFound(tile_set_id.to_string()));
        }
        self.write(tile_set_id, clusters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::{Cluster, ClusterId};
    use crate::grid::TilePos;
    use crate::tile::TileKind;
    use tempfile::tempdir;

    fn sample() -> ClusterSet {
        let mut set = ClusterSet::new();
        set.push(Cluster::new(
            ClusterId(4),
            TileKind::IronOre,
            vec![TilePos::new(1, 1), TilePos::new(2, 1)],
        ));
        set
    }

    #[test]
    fn memory_store_requires_save_before_update() {
        let store = MemoryClusterStore::new();
        assert!(matches!(
            store.update("a", &sample()),
            Err(StoreError::NotFound(_))
        ));
        store.save("a", &sample()).unwrap();
        store.update("a", &ClusterSet::new()).unwrap();
        assert!(store.load("a").unwrap().is_empty());
        assert_eq!((store.save_count(), store.update_count()), (1, 1));
    }

    #[test]
    fn file_store_reloads_what_it_saved() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.save("valley/01", &sample()).unwrap();

        let loaded = store.load("valley/01").unwrap();
        assert_eq!(loaded, sample());
        assert!(store.path_for("valley/01").ends_with("valley_01.clusters.json"));
        assert!(store.saved_at("valley/01").is_ok());
    }

    #[test]
    fn file_store_missing_tile_set_is_not_found() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(matches!(store.load("nope"), Err(StoreError::NotFound(_))));
        assert!(matches!(
            store.update("nope", &sample()),
            Err(StoreError::NotFound(_))
        ));
    }
}
