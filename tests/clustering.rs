use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use tileworld::{
    cluster::{cluster_chunk, ChunkOutput, ChunkWindow},
    config::ClusterConfig,
    engine::{BuildMode, ClusterBuilder, ClusterEngine, RemovalOutcome},
    map::{ClusterSource, MapState, TileMap},
    scheduler::ChunkWorker,
    store::MemoryClusterStore,
    tile::cluster_kind,
    ClusterError, ClusterSet, Grid, Tile, TileKind, TilePos,
};

fn config(workers: usize) -> ClusterConfig {
    ClusterConfig {
        workers: Some(workers),
        ..ClusterConfig::default()
    }
}

fn engine(workers: usize) -> (ClusterEngine, Arc<MemoryClusterStore>) {
    let store = Arc::new(MemoryClusterStore::new());
    (ClusterEngine::new(&config(workers), store.clone()), store)
}

/// Breadth-first flood fill, independent of the union-find path.
fn reference_components(grid: &Grid) -> Vec<(TileKind, Vec<TilePos>)> {
    let mut seen = HashSet::new();
    let mut components = Vec::new();
    for start in grid.positions() {
        let Some(kind) = cluster_kind(grid.get_tile(start)) else {
            continue;
        };
        if !seen.insert(start) {
            continue;
        }
        let mut points = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(pos) = queue.pop_front() {
            for next in grid.neighbors(pos) {
                if cluster_kind(grid.get_tile(next)) == Some(kind) && seen.insert(next) {
                    points.push(next);
                    queue.push_back(next);
                }
            }
        }
        points.sort();
        components.push((kind, points));
    }
    components.sort();
    components
}

fn normalized(set: &ClusterSet) -> Vec<(TileKind, Vec<TilePos>)> {
    let mut clusters: Vec<_> = set
        .iter()
        .map(|cluster| {
            let mut points = cluster.points.to_vec();
            points.sort();
            (cluster.kind, points)
        })
        .collect();
    clusters.sort();
    clusters
}

fn random_grid(rng: &mut ChaCha8Rng, width: u32, height: u32) -> Grid {
    let palette = [
        Tile::new(TileKind::Grass),
        Tile::new(TileKind::Grass),
        Tile::new(TileKind::Water),
        Tile::new(TileKind::Rock),
        Tile::new(TileKind::Wood),
        Tile::with_mask(TileKind::Grass, TileKind::Wood),
        Tile::with_mask(TileKind::Grass, TileKind::Leaf),
        Tile::with_mask(TileKind::Rock, TileKind::CopperOre),
        Tile::with_mask(TileKind::Grass, TileKind::Grass),
    ];
    let tiles = (0..width * height)
        .map(|_| palette[rng.gen_range(0..palette.len())].clone())
        .collect();
    Grid::from_columns(width, height, tiles).unwrap()
}

#[tokio::test]
async fn forest_of_wood_and_leaf_is_one_tree() {
    let grid = Grid::from_rows(&["....", ".L..", ".T..", ".T.."]).unwrap();
    let (mut engine, _) = engine(2);
    engine.build_clusters("forest", &grid).await.unwrap();

    let trees = engine.clusters().get(TileKind::Tree);
    assert_eq!(trees.len(), 1);
    assert_eq!(trees[0].len(), 3);
    assert_eq!(trees[0].center, TilePos::new(1, 1));
    assert_eq!(engine.clusters().len(), 1);
}

#[tokio::test]
async fn ore_vein_across_the_split_is_one_cluster() {
    let grid = Grid::from_rows(&[
        "........", "........", "...CC...", "...CC...", "........", "........",
    ])
    .unwrap();
    let (mut engine, _) = engine(2);
    let report = engine.build_clusters("vein", &grid).await.unwrap();
    assert_eq!(report.mode, BuildMode::Parallel { workers: 2 });

    let ore = engine.clusters().get(TileKind::CopperOre);
    assert_eq!(ore.len(), 1);
    assert_eq!(ore[0].len(), 4);
    for pos in [(3, 2), (3, 3), (4, 2), (4, 3)] {
        let found = engine.cluster_at(TilePos::new(pos.0, pos.1)).unwrap();
        assert_eq!(found.id, ore[0].id);
    }
}

#[tokio::test]
async fn random_grids_match_flood_fill_for_any_worker_count() {
    let mut rng = ChaCha8Rng::seed_from_u64(0x7115);
    for round in 0..12 {
        let width = rng.gen_range(1..40);
        let height = rng.gen_range(1..25);
        let grid = random_grid(&mut rng, width, height);
        let expected = reference_components(&grid);

        for workers in [1, 2, 3, 5, 8, 64] {
            let builder = ClusterBuilder::new(&config(workers));
            let report = builder.build(&grid).await.unwrap();
            assert_eq!(
                normalized(&report.clusters),
                expected,
                "round {round}: {width}x{height} with {workers} workers"
            );
        }
    }
}

#[tokio::test]
async fn every_clusterable_tile_is_in_exactly_one_cluster() {
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let grid = random_grid(&mut rng, 48, 32);
    let (mut engine, _) = engine(6);
    engine.build_clusters("cover", &grid).await.unwrap();

    for pos in grid.positions() {
        let tile = grid.get_tile(pos).unwrap();
        let owners = engine
            .clusters()
            .iter()
            .filter(|cluster| cluster.contains(pos))
            .count();
        match tile.cluster_kind() {
            None => {
                assert_eq!(owners, 0, "{pos:?} is background");
                assert!(engine.cluster_at(pos).is_none());
            }
            Some(kind) => {
                assert_eq!(owners, 1, "{pos:?}");
                let found = engine.cluster_at(pos).unwrap();
                assert_eq!(found.kind, kind.display_kind());
            }
        }
    }
}

#[tokio::test]
async fn clusters_are_connected_and_single_kind() {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let grid = random_grid(&mut rng, 30, 30);
    let builder = ClusterBuilder::new(&config(4));
    let report = builder.build(&grid).await.unwrap();

    for cluster in report.clusters.iter() {
        let members: HashSet<TilePos> = cluster.points.iter().copied().collect();
        assert_eq!(members.len(), cluster.len(), "duplicate points");
        for pos in cluster.points.iter() {
            assert_eq!(
                grid.get_tile(*pos).unwrap().effective_kind(),
                cluster.kind,
                "mixed kinds in cluster {:?}",
                cluster.id
            );
        }

        let mut reached = HashSet::from([cluster.points[0]]);
        let mut queue = VecDeque::from([cluster.points[0]]);
        while let Some(pos) = queue.pop_front() {
            for next in grid.neighbors(pos) {
                if members.contains(&next) && reached.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        assert_eq!(reached.len(), members.len(), "cluster {:?} is split", cluster.id);
    }
}

#[tokio::test]
async fn removal_only_touches_the_removed_cluster() {
    let grid = Grid::from_rows(&["TT.~~", "T..~.", "..CC.", "#...."]).unwrap();
    let (mut engine, store) = engine(3);
    engine.build_clusters("chop", &grid).await.unwrap();
    let before: Vec<_> = engine
        .clusters()
        .iter()
        .filter(|c| c.kind != TileKind::Tree)
        .cloned()
        .collect();

    let tree = engine.cluster_at(TilePos::new(0, 1)).unwrap();
    let outcome = engine.remove_cluster(&tree).await.unwrap();
    assert!(matches!(outcome, RemovalOutcome::Removed(_)));

    for pos in tree.points.iter() {
        assert!(engine.cluster_at(*pos).is_none());
    }
    for cluster in &before {
        for pos in cluster.points.iter() {
            assert_eq!(engine.cluster_at(*pos).map(|c| c.id), Some(cluster.id));
        }
    }
    assert_eq!(store.update_count(), 1);
}

struct FailOn(usize);

impl ChunkWorker for FailOn {
    fn name(&self) -> &str {
        "fail_on"
    }

    fn run(&self, window: &ChunkWindow) -> Result<ChunkOutput, ClusterError> {
        if window.range.index == self.0 {
            return Err(ClusterError::ChunkProcessing {
                chunk: window.range.index,
                start_x: window.range.start_x,
                end_x: window.range.end_x,
                message: "injected failure".to_string(),
            });
        }
        cluster_chunk(window)
    }
}

fn failing_engine(store: Arc<MemoryClusterStore>) -> ClusterEngine {
    let builder = ClusterBuilder::with_worker(&config(4), Arc::new(FailOn(2)));
    ClusterEngine::with_builder(builder, store)
}

#[tokio::test]
async fn one_failed_chunk_fails_the_build_and_saves_nothing() {
    let grid = Grid::from_rows(&["~~~~~~~~", "TT..TT.."]).unwrap();
    let store = Arc::new(MemoryClusterStore::new());
    let mut engine = failing_engine(store.clone());

    let err = engine.build_clusters("broken", &grid).await.unwrap_err();
    assert!(matches!(err, ClusterError::ChunkProcessing { chunk: 2, .. }));
    assert_eq!(store.save_count(), 0);
    assert!(!store.contains("broken"));
    assert!(engine.clusters().is_empty());
    assert!(engine.cluster_at(TilePos::new(0, 0)).is_none());
}

#[tokio::test]
async fn map_falls_back_to_sequential_build() {
    let grid = Grid::from_rows(&["~~~~~~~~", "TT..TT.."]).unwrap();
    let store = Arc::new(MemoryClusterStore::new());
    let mut map = TileMap::with_engine(grid, failing_engine(store.clone()), true);

    let source = map.initialize("fallback").await.unwrap();
    assert_eq!(source, ClusterSource::Built(BuildMode::Sequential));
    assert_eq!(map.state(), &MapState::Ready);
    assert_eq!(store.save_count(), 1);
    assert_eq!(map.engine().clusters().get(TileKind::Water).len(), 1);
    assert_eq!(map.engine().clusters().get(TileKind::Tree).len(), 2);
}

#[tokio::test]
async fn map_without_fallback_reports_failure() {
    let grid = Grid::from_rows(&["~~~~~~~~"]).unwrap();
    let store = Arc::new(MemoryClusterStore::new());
    let mut map = TileMap::with_engine(grid, failing_engine(store.clone()), false);

    assert!(map.initialize("strict").await.is_err());
    assert!(matches!(map.state(), MapState::Failed(message) if message.contains("injected")));
    assert!(!map.is_playable());
    assert_eq!(store.save_count(), 0);
}
