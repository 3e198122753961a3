//! Cluster engine: builds, serves and mutates the cluster state of one map

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::cluster::{
    cluster_chunk, merge_chunks, partition_columns, worker_count, Cluster, ClusterIndex,
    ClusterSet, ChunkWindow,
};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, StoreError};
use crate::grid::{Grid, TilePos};
use crate::scheduler::{ChunkReport, ChunkWorker, TaskScheduler, UnionFindWorker};
use crate::store::ClusterStore;
use crate::tile::TileKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Parallel { workers: usize },
    Sequential,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub clusters: ClusterSet,
    pub mode: BuildMode,
    pub chunks: Vec<ChunkReport>,
    pub duration_ms: f64,
}

/// Partition, schedule and merge. Holds no cluster state of its own.
pub struct ClusterBuilder {
    scheduler: TaskScheduler,
    workers: Option<usize>,
    in_flight: AtomicBool,
}

impl ClusterBuilder {
    pub fn new(config: &ClusterConfig) -> Self {
        Self::with_worker(config, Arc::new(UnionFindWorker))
    }

    pub fn with_worker(config: &ClusterConfig, worker: Arc<dyn ChunkWorker>) -> Self {
        Self {
            scheduler: TaskScheduler::new(worker, config.chunk_timeout()),
            workers: config.workers,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Parallel build over column chunks. Fails on the first chunk failure and
    /// rejects a second build while one is running.
    pub async fn build(&self, grid: &Grid) -> Result<BuildReport, ClusterError> {
        let _guard = BuildGuard::acquire(&self.in_flight)?;
        let started = Instant::now();
        let workers = worker_count(self.workers, grid.width());
        let windows: Vec<ChunkWindow> = partition_columns(grid.width(), workers)
            .into_iter()
            .map(|range| ChunkWindow::capture(grid, range))
            .collect();

        info!(
            width = grid.width(),
            height = grid.height(),
            chunks = windows.len(),
            worker = self.scheduler.worker_name(),
            "cluster build started"
        );
        let run = self.scheduler.run(windows).await?;
        let clusters = merge_chunks(&run.outputs);

        Ok(BuildReport {
            clusters,
            mode: BuildMode::Parallel {
                workers: run.outputs.len(),
            },
            chunks: run.reports,
            duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
        })
    }

    /// Single-chunk pass on the calling thread.
    pub fn build_sequential(&self, grid: &Grid) -> Result<BuildReport, ClusterError> {
        let _guard = BuildGuard::acquire(&self.in_flight)?;
        let started = Instant::now();
        let clusters = if grid.width() == 0 || grid.height() == 0 {
            ClusterSet::new()
        } else {
            let output = cluster_chunk(&ChunkWindow::whole(grid))?;
            merge_chunks(std::slice::from_ref(&output))
        };
        Ok(BuildReport {
            clusters,
            mode: BuildMode::Sequential,
            chunks: Vec::new(),
            duration_ms: started.elapsed().as_secs_f64() * 1_000.0,
        })
    }

    pub fn is_building(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct BuildGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BuildGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ClusterError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ClusterError::BuildInProgress)?;
        Ok(Self { flag })
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemovalOutcome {
    Removed(Cluster),
    /// The cluster was already gone (stale reference).
    NotFound,
}

/// Cluster set, point index and persistence for one tile set.
pub struct ClusterEngine {
    builder: ClusterBuilder,
    store: Arc<dyn ClusterStore>,
    clusters: ClusterSet,
    index: ClusterIndex,
    tile_set_id: Option<String>,
}

impl ClusterEngine {
    pub fn new(config: &ClusterConfig, store: Arc<dyn ClusterStore>) -> Self {
        Self::with_builder(ClusterBuilder::new(config), store)
    }

    pub fn with_builder(builder: ClusterBuilder, store: Arc<dyn ClusterStore>) -> Self {
        Self {
            builder,
            store,
            clusters: ClusterSet::new(),
            index: ClusterIndex::new(),
            tile_set_id: None,
        }
    }

    /// Parallel build, then save. Nothing is saved or installed on failure.
    pub async fn build_clusters(
        &mut self,
        tile_set_id: &str,
        grid: &Grid,
    ) -> Result<BuildReport, ClusterError> {
        let report = self.builder.build(grid).await?;
        self.commit(tile_set_id, &report).await?;
        Ok(report)
    }

    /// Sequential build, then save.
    pub async fn build_clusters_sequential(
        &mut self,
        tile_set_id: &str,
        grid: &Grid,
    ) -> Result<BuildReport, ClusterError> {
        let report = self.builder.build_sequential(grid)?;
        self.commit(tile_set_id, &report).await?;
        Ok(report)
    }

    /// Installs previously stored clusters instead of building.
    pub async fn load_clusters(&mut self, tile_set_id: &str) -> Result<usize, ClusterError> {
        let store = Arc::clone(&self.store);
        let id = tile_set_id.to_string();
        let clusters = tokio::task::spawn_blocking(move || store.load(&id))
            .await
            .map_err(join_failure)??;
        let count = clusters.len();
        self.install(tile_set_id, clusters);
        info!(tile_set_id, clusters = count, "clusters loaded from store");
        Ok(count)
    }

    /// Cluster at `pos`, with wood and leaf reported as trees.
    pub fn cluster_at(&self, pos: TilePos) -> Option<Cluster> {
        self.index.lookup(pos)
    }

    /// Removes `cluster` from the set and index once the store accepts the
    /// reduced set.
    ///
    /// Matches by id, then by the first cluster with the same kind and center.
    /// Either way the stored cluster must also agree on center and size, so a
    /// reference kept across a rebuild never takes out a newer cluster. A
    /// cluster that is no longer present is logged and reported as
    /// [`RemovalOutcome::NotFound`]. A failed store update leaves the engine
    /// untouched.
    pub async fn remove_cluster(
        &mut self,
        cluster: &Cluster,
    ) -> Result<RemovalOutcome, ClusterError> {
        let tile_set_id = self.tile_set_id.clone().ok_or(ClusterError::NoTileSet)?;

        let mut remaining = self.clusters.clone();
        let Some(removed) = take_matching(&mut remaining, cluster) else {
            warn!(
                tile_set_id = %tile_set_id,
                id = cluster.id.0,
                kind = cluster.kind.name(),
                center = ?cluster.center,
                "remove requested for a cluster that is no longer present"
            );
            return Ok(RemovalOutcome::NotFound);
        };

        self.clusters = self.persist_update(&tile_set_id, remaining).await?;
        let dropped = self.index.remove_points(&removed.points);
        debug!(
            tile_set_id = %tile_set_id,
            id = removed.id.0,
            points = dropped,
            "cluster removed"
        );
        Ok(RemovalOutcome::Removed(removed))
    }

    pub fn clusters(&self) -> &ClusterSet {
        &self.clusters
    }

    pub fn index(&self) -> &ClusterIndex {
        &self.index
    }

    pub fn tile_set_id(&self) -> Option<&str> {
        self.tile_set_id.as_deref()
    }

    pub fn builder(&self) -> &ClusterBuilder {
        &self.builder
    }

    async fn commit(&mut self, tile_set_id: &str, report: &BuildReport) -> Result<(), ClusterError> {
        let store = Arc::clone(&self.store);
        let id = tile_set_id.to_string();
        let snapshot = report.clusters.clone();
        tokio::task::spawn_blocking(move || store.save(&id, &snapshot))
            .await
            .map_err(join_failure)??;

        self.install(tile_set_id, report.clusters.clone());
        info!(
            tile_set_id,
            mode = ?report.mode,
            clusters = self.clusters.len(),
            indexed_points = self.index.len(),
            duration_ms = report.duration_ms,
            "cluster build committed"
        );
        Ok(())
    }

    fn install(&mut self, tile_set_id: &str, clusters: ClusterSet) {
        self.index.build(&clusters);
        self.clusters = clusters;
        self.tile_set_id = Some(tile_set_id.to_string());
    }

    async fn persist_update(
        &self,
        tile_set_id: &str,
        snapshot: ClusterSet,
    ) -> Result<ClusterSet, ClusterError> {
        let store = Arc::clone(&self.store);
        let id = tile_set_id.to_string();
        let snapshot = tokio::task::spawn_blocking(move || {
            store.update(&id, &snapshot).map(|()| snapshot)
        })
        .await
        .map_err(join_failure)??;
        debug!(tile_set_id, clusters = snapshot.len(), "cluster set updated in store");
        Ok(snapshot)
    }
}

/// Pulls the cluster `reference` points at out of `clusters`.
fn take_matching(clusters: &mut ClusterSet, reference: &Cluster) -> Option<Cluster> {
    let by_id = clusters
        .find(reference.id)
        .filter(|stored| same_cluster(stored, reference))
        .map(|stored| stored.kind);
    if let Some(kind) = by_id {
        return clusters.remove(kind, |c| c.id == reference.id);
    }

    let candidates: &[TileKind] = if reference.kind.display_kind() == TileKind::Tree {
        &[TileKind::Tree, TileKind::Wood, TileKind::Leaf]
    } else {
        std::slice::from_ref(&reference.kind)
    };
    candidates
        .iter()
        .find_map(|kind| clusters.remove(*kind, |c| same_cluster(c, reference)))
}

/// Lookup copies show wood and leaf as tree, so kinds compare by display kind.
fn same_cluster(stored: &Cluster, reference: &Cluster) -> bool {
    stored.kind.display_kind() == reference.kind.display_kind()
        && stored.center == reference.center
        && stored.len() == reference.len()
}

fn join_failure(err: tokio::task::JoinError) -> StoreError {
    StoreError::Io(std::io::Error::other(err.to_string()))
}
