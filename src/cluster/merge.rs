//! Fusing per-chunk components into global clusters

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use crate::cluster::chunk::{ChunkOutput, ClusterPoint};
use crate::cluster::union_find::UnionFind;
use crate::cluster::{Cluster, ClusterId, ClusterSet};
use crate::grid::TilePos;

/// Merges chunk outputs into a [`ClusterSet`].
///
/// Groups are re-keyed by `(chunk, root)` before anything is combined. Seams
/// then drive a second union-find over those groups, so a component cut by a
/// chunk boundary comes out as a single cluster. Ids are assigned in chunk and
/// root order, which keeps them stable across runs with the same partition.
pub fn merge_chunks(outputs: &[ChunkOutput]) -> ClusterSet {
    let mut groups: Vec<&[ClusterPoint]> = Vec::new();
    let mut owner: HashMap<TilePos, usize> = HashMap::new();

    for output in outputs {
        for points in output.groups.values() {
            if points.is_empty() {
                continue;
            }
            let slot = groups.len();
            for point in points {
                owner.insert(point.pos, slot);
            }
            groups.push(points);
        }
    }

    let mut sets = UnionFind::new(groups.len());
    for (chunk, output) in outputs.iter().enumerate() {
        for seam in &output.seams {
            match (owner.get(&seam.inner), owner.get(&seam.outer)) {
                (Some(&inner), Some(&outer)) => sets.union(inner, outer),
                _ => warn!(
                    chunk,
                    inner = ?seam.inner,
                    outer = ?seam.outer,
                    "seam endpoint missing from chunk outputs"
                ),
            }
        }
    }

    let mut fused: BTreeMap<usize, Vec<ClusterPoint>> = BTreeMap::new();
    for (slot, points) in groups.iter().enumerate() {
        let root = sets.find(slot);
        fused.entry(root).or_default().extend_from_slice(points);
    }

    let mut set = ClusterSet::new();
    for (next_id, points) in fused.into_values().enumerate() {
        let Some(first) = points.first() else {
            continue;
        };
        let kind = first.kind;
        let positions = points.iter().map(|point| point.pos).collect();
        set.push(Cluster::new(ClusterId(next_id as u32), kind, positions));
    }
    set
}
