//! Point to cluster lookup

use std::collections::HashMap;

use crate::cluster::{Cluster, ClusterSet};
use crate::grid::TilePos;

/// Derived cache mapping each member point to its cluster.
///
/// Entries share their cluster's point list, so the index costs one small
/// record per point.
#[derive(Debug, Default, Clone)]
pub struct ClusterIndex {
    entries: HashMap<u64, Cluster>,
}

impl ClusterIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_set(set: &ClusterSet) -> Self {
        let mut index = Self::new();
        index.build(set);
        index
    }

    /// Clears and repopulates the index from every cluster's points.
    pub fn build(&mut self, set: &ClusterSet) {
        self.entries.clear();
        self.entries.reserve(set.iter().map(Cluster::len).sum());
        for cluster in set.iter() {
            for pos in cluster.points.iter() {
                self.entries.insert(pos.key(), cluster.clone());
            }
        }
    }

    /// Cluster at `pos`. Wood and leaf clusters are reported as trees.
    pub fn lookup(&self, pos: TilePos) -> Option<Cluster> {
        let cluster = self.entries.get(&pos.key())?;
        let mut found = cluster.clone();
        found.kind = found.kind.display_kind();
        Some(found)
    }

    /// Stored cluster at `pos` with its own kind.
    pub fn get(&self, pos: TilePos) -> Option<&Cluster> {
        self.entries.get(&pos.key())
    }

    /// Drops the entries for `points` only; other clusters keep theirs.
    pub fn remove_points(&mut self, points: &[TilePos]) -> usize {
        points
            .iter()
            .filter(|pos| self.entries.remove(&pos.key()).is_some())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
