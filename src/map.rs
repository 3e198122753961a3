//! Map component: the tile grid plus its cluster engine

use std::sync::Arc;

use tracing::{info, warn};

use crate::cluster::Cluster;
use crate::config::ClusterConfig;
use crate::engine::{BuildMode, ClusterEngine, RemovalOutcome};
use crate::error::{ClusterError, StoreError};
use crate::grid::{Grid, TilePos};
use crate::store::ClusterStore;
use crate::tile::OverlayMask;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapState {
    Uninitialized,
    Ready,
    /// Tiles changed after the last build; new features have no clusters yet.
    Stale,
    /// Initialization failed; gameplay must not start. Retry with `initialize`.
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSource {
    Loaded,
    Built(BuildMode),
}

pub struct TileMap {
    grid: Grid,
    engine: ClusterEngine,
    fallback_to_sequential: bool,
    state: MapState,
}

impl TileMap {
    pub fn new(grid: Grid, config: &ClusterConfig, store: Arc<dyn ClusterStore>) -> Self {
        Self::with_engine(
            grid,
            ClusterEngine::new(config, store),
            config.fallback_to_sequential,
        )
    }

    pub fn with_engine(grid: Grid, engine: ClusterEngine, fallback_to_sequential: bool) -> Self {
        Self {
            grid,
            engine,
            fallback_to_sequential,
            state: MapState::Uninitialized,
        }
    }

    /// Loads stored clusters for `tile_set_id`, or builds them when none exist.
    pub async fn initialize(&mut self, tile_set_id: &str) -> Result<ClusterSource, ClusterError> {
        let result = match self.engine.load_clusters(tile_set_id).await {
            Ok(_) => Ok(ClusterSource::Loaded),
            Err(ClusterError::Store(StoreError::NotFound(_))) => self.build(tile_set_id).await,
            Err(err) => Err(err),
        };
        self.settle(result)
    }

    /// Builds from the current tiles, ignoring anything stored.
    pub async fn rebuild(&mut self) -> Result<ClusterSource, ClusterError> {
        let tile_set_id = self
            .engine
            .tile_set_id()
            .map(str::to_string)
            .ok_or(ClusterError::NoTileSet)?;
        let result = self.build(&tile_set_id).await;
        self.settle(result)
    }

    async fn build(&mut self, tile_set_id: &str) -> Result<ClusterSource, ClusterError> {
        match self.engine.build_clusters(tile_set_id, &self.grid).await {
            Ok(report) => Ok(ClusterSource::Built(report.mode)),
            Err(err) if err.is_chunk_failure() && self.fallback_to_sequential => {
                warn!(
                    tile_set_id,
                    error = %err,
                    "parallel cluster build failed, falling back to sequential pass"
                );
                let report = self
                    .engine
                    .build_clusters_sequential(tile_set_id, &self.grid)
                    .await?;
                Ok(ClusterSource::Built(report.mode))
            }
            Err(err) => Err(err),
        }
    }

    fn settle(
        &mut self,
        result: Result<ClusterSource, ClusterError>,
    ) -> Result<ClusterSource, ClusterError> {
        match &result {
            Ok(source) => {
                info!(source = ?source, clusters = self.engine.clusters().len(), "map ready");
                self.state = MapState::Ready;
            }
            Err(err) => {
                warn!(error = %err, "map initialization failed");
                self.state = MapState::Failed(err.to_string());
            }
        }
        result
    }

    pub fn cluster_at(&self, pos: TilePos) -> Option<Cluster> {
        self.engine.cluster_at(pos)
    }

    /// Gameplay depletion (chopping, mining): removes the cluster at `pos` and
    /// strips the overlays from its tiles. `Ok(None)` when `pos` is not in a
    /// cluster. On error neither the tiles nor the clusters have changed.
    pub async fn deplete_at(&mut self, pos: TilePos) -> Result<Option<Cluster>, ClusterError> {
        if !self.is_playable() {
            return Err(ClusterError::NoTileSet);
        }
        let Some(cluster) = self.engine.cluster_at(pos) else {
            return Ok(None);
        };
        match self.engine.remove_cluster(&cluster).await? {
            RemovalOutcome::Removed(removed) => {
                for point in removed.points.iter() {
                    self.grid.clear_mask(*point);
                }
                Ok(Some(removed))
            }
            RemovalOutcome::NotFound => Ok(None),
        }
    }

    /// Writes a region of overlays. Rejected without changes when the data
    /// does not fit; otherwise the clusters are stale until `rebuild`.
    pub fn apply_overlays(
        &mut self,
        origin: TilePos,
        width: u32,
        height: u32,
        masks: Vec<Option<OverlayMask>>,
    ) -> Result<(), ClusterError> {
        self.grid.apply_overlays(origin, width, height, masks)?;
        if self.state == MapState::Ready {
            self.state = MapState::Stale;
        }
        Ok(())
    }

    pub fn is_playable(&self) -> bool {
        matches!(self.state, MapState::Ready | MapState::Stale)
    }

    pub fn state(&self) -> &MapState {
        &self.state
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn engine(&self) -> &ClusterEngine {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterSet;
    use crate::store::MemoryClusterStore;
    use crate::tile::TileKind;

    fn map(rows: &[&str]) -> (TileMap, Arc<MemoryClusterStore>) {
        let store = Arc::new(MemoryClusterStore::new());
        let config = ClusterConfig {
            workers: Some(2),
            ..ClusterConfig::default()
        };
        let grid = Grid::from_rows(rows).unwrap();
        (TileMap::new(grid, &config, store.clone()), store)
    }

    #[tokio::test]
    async fn initialize_builds_then_loads() {
        let (mut first, store) = map(&["TT..", "..~~"]);
        let source = first.initialize("meadow").await.unwrap();
        assert_eq!(source, ClusterSource::Built(BuildMode::Parallel { workers: 2 }));
        assert_eq!(first.state(), &MapState::Ready);

        let config = ClusterConfig::default();
        let grid = Grid::from_rows(&["TT..", "..~~"]).unwrap();
        let mut second = TileMap::new(grid, &config, store.clone());
        assert_eq!(second.initialize("meadow").await.unwrap(), ClusterSource::Loaded);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn depletion_strips_overlays() {
        let (mut map, _) = map(&[".T..", ".L..", "...."]);
        map.initialize("grove").await.unwrap();

        let removed = map.deplete_at(TilePos::new(1, 1)).await.unwrap().unwrap();
        assert_eq!(removed.len(), 2);
        assert!(map.grid().get_tile(TilePos::new(1, 0)).unwrap().is_background());
        assert!(map.cluster_at(TilePos::new(1, 0)).is_none());
        assert!(map.deplete_at(TilePos::new(1, 0)).await.unwrap().is_none());
    }

    struct FailingUpdates(MemoryClusterStore);

    impl ClusterStore for FailingUpdates {
        fn save(&self, tile_set_id: &str, clusters: &ClusterSet) -> Result<(), StoreError> {
            self.0.save(tile_set_id, clusters)
        }

        fn load(&self, tile_set_id: &str) -> Result<ClusterSet, StoreError> {
            self.0.load(tile_set_id)
        }

        fn update(&self, _: &str, _: &ClusterSet) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk full")))
        }
    }

    #[tokio::test]
    async fn failed_depletion_leaves_map_unchanged() {
        let grid = Grid::from_rows(&["TT.."]).unwrap();
        let store = Arc::new(FailingUpdates(MemoryClusterStore::new()));
        let mut map = TileMap::new(grid, &ClusterConfig::default(), store);
        map.initialize("orchard").await.unwrap();

        let err = map.deplete_at(TilePos::new(0, 0)).await.unwrap_err();
        assert!(matches!(err, ClusterError::Store(StoreError::Io(_))));
        assert!(map.cluster_at(TilePos::new(0, 0)).is_some());
        let tile = map.grid().get_tile(TilePos::new(1, 0)).unwrap();
        assert!(tile.mask.is_some(), "overlay stripped despite failed removal");
        assert_eq!(map.engine().clusters().len(), 1);
        assert!(map.is_playable());
    }

    #[tokio::test]
    async fn depletion_requires_initialized_map() {
        let (mut map, _) = map(&["T"]);
        assert!(matches!(
            map.deplete_at(TilePos::new(0, 0)).await,
            Err(ClusterError::NoTileSet)
        ));
    }

    #[tokio::test]
    async fn overlay_update_marks_clusters_stale_until_rebuild() {
        let (mut map, _) = map(&["....", "...."]);
        map.initialize("field").await.unwrap();
        assert!(map.engine().clusters().is_empty());

        let masks = vec![Some(OverlayMask::new(TileKind::Wood)); 2];
        map.apply_overlays(TilePos::new(0, 0), 2, 1, masks).unwrap();
        assert_eq!(map.state(), &MapState::Stale);
        assert!(map.cluster_at(TilePos::new(0, 0)).is_none());

        map.rebuild().await.unwrap();
        assert_eq!(map.state(), &MapState::Ready);
        assert_eq!(map.cluster_at(TilePos::new(1, 0)).unwrap().kind, TileKind::Tree);
    }

    #[tokio::test]
    async fn mismatched_overlay_update_changes_nothing() {
        let (mut map, _) = map(&["....", "...."]);
        map.initialize("field").await.unwrap();
        let masks = vec![Some(OverlayMask::new(TileKind::Wood)); 3];
        let err = map
            .apply_overlays(TilePos::new(0, 0), 2, 1, masks)
            .unwrap_err();
        assert!(matches!(err, ClusterError::DimensionMismatch { .. }));
        assert_eq!(map.state(), &MapState::Ready);
    }
}
