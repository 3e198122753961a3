//! Connected-component clustering of same-kind tiles
//!
//! A build runs in three stages: [`partition`] splits the grid into column
//! chunks, [`chunk`] labels each chunk with union-find, and [`merge`] fuses the
//! per-chunk components into a [`ClusterSet`]. [`index`] answers point lookups
//! over the result.

pub mod chunk;
pub mod index;
pub mod merge;
pub mod partition;
mod union_find;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::grid::TilePos;
use crate::tile::TileKind;

pub use chunk::{cluster_chunk, ChunkOutput, ChunkWindow, ClusterPoint, Seam};
pub use index::ClusterIndex;
pub use merge::merge_chunks;
pub use partition::{partition_columns, worker_count, ChunkRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

/// Maximal 4-connected group of same-kind, non-background tiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub kind: TileKind,
    /// Shared so index entries and display copies don't duplicate point lists.
    pub points: Arc<[TilePos]>,
    pub center: TilePos,
}

impl Cluster {
    pub fn new(id: ClusterId, kind: TileKind, points: Vec<TilePos>) -> Self {
        let center = centroid(&points);
        Self {
            id,
            kind,
            points: points.into(),
            center,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        self.points.contains(&pos)
    }
}

/// Integer centroid: floor of the mean x and mean y.
pub fn centroid(points: &[TilePos]) -> TilePos {
    if points.is_empty() {
        return TilePos::new(0, 0);
    }
    let n = points.len() as u64;
    let (sum_x, sum_y) = points.iter().fold((0u64, 0u64), |(sx, sy), pos| {
        (sx + pos.x as u64, sy + pos.y as u64)
    });
    TilePos::new((sum_x / n) as u32, (sum_y / n) as u32)
}

/// Clusters bucketed by kind. Every kind has a bucket, possibly empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSet {
    buckets: [Vec<Cluster>; TileKind::COUNT],
}

impl ClusterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cluster: Cluster) {
        self.buckets[cluster.kind.index()].push(cluster);
    }

    pub fn get(&self, kind: TileKind) -> &[Cluster] {
        &self.buckets[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> + '_ {
        self.buckets.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Cluster count per kind, in [`TileKind::ALL`] order.
    pub fn counts(&self) -> Vec<(TileKind, usize)> {
        TileKind::ALL
            .iter()
            .map(|kind| (*kind, self.buckets[kind.index()].len()))
            .collect()
    }

    /// Removes the first cluster of `kind` matching `predicate`.
    pub fn remove<F>(&mut self, kind: TileKind, predicate: F) -> Option<Cluster>
    where
        F: Fn(&Cluster) -> bool,
    {
        let bucket = &mut self.buckets[kind.index()];
        let position = bucket.iter().position(predicate)?;
        Some(bucket.remove(position))
    }

    pub fn find(&self, id: ClusterId) -> Option<&Cluster> {
        self.iter().find(|cluster| cluster.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(x: u32, y: u32) -> TilePos {
        TilePos::new(x, y)
    }

    #[test]
    fn centroid_floors_the_mean() {
        assert_eq!(centroid(&[pos(1, 0), pos(1, 1), pos(1, 2)]), pos(1, 1));
        assert_eq!(centroid(&[pos(0, 0), pos(1, 1)]), pos(0, 0));
        assert_eq!(centroid(&[pos(3, 2), pos(4, 3)]), pos(3, 2));
    }

    #[test]
    fn set_has_a_bucket_for_every_kind() {
        let set = ClusterSet::new();
        assert!(set.is_empty());
        for kind in TileKind::ALL {
            assert!(set.get(kind).is_empty());
        }
        assert_eq!(set.counts().len(), TileKind::COUNT);
    }

    #[test]
    fn remove_takes_first_match_only() {
        let mut set = ClusterSet::new();
        set.push(Cluster::new(ClusterId(1), TileKind::Water, vec![pos(0, 0)]));
        set.push(Cluster::new(ClusterId(2), TileKind::Water, vec![pos(0, 0)]));

        let removed = set
            .remove(TileKind::Water, |cluster| cluster.center == pos(0, 0))
            .unwrap();
        assert_eq!(removed.id, ClusterId(1));
        assert_eq!(set.get(TileKind::Water).len(), 1);
        assert!(set.remove(TileKind::Rock, |_| true).is_none());
    }
}
