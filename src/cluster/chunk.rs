//! Per-chunk connected-component labeling

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cluster::partition::ChunkRange;
use crate::cluster::union_find::UnionFind;
use crate::error::ClusterError;
use crate::grid::{Grid, TilePos};
use crate::tile::{cluster_kind, Tile, TileKind};

/// Read-only copy of a chunk's columns plus the adjacent column on each side.
///
/// Workers see only this snapshot; the halo columns are readable for
/// adjacency tests but their cells are never emitted as members.
#[derive(Debug, Clone)]
pub struct ChunkWindow {
    pub range: ChunkRange,
    pub read_start: u32,
    pub read_end: u32,
    pub height: u32,
    pub grid_width: u32,
    pub tiles: Vec<Tile>,
}

impl ChunkWindow {
    pub fn capture(grid: &Grid, range: ChunkRange) -> Self {
        let (read_start, read_end) = range.read_window(grid.width());
        Self {
            range,
            read_start,
            read_end,
            height: grid.height(),
            grid_width: grid.width(),
            tiles: grid.columns(read_start, read_end).to_vec(),
        }
    }

    /// The whole grid as one chunk, for the sequential pass.
    pub fn whole(grid: &Grid) -> Self {
        Self::capture(
            grid,
            ChunkRange {
                index: 0,
                start_x: 0,
                end_x: grid.width(),
            },
        )
    }

    fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        if x < self.read_start || x >= self.read_end || y >= self.height {
            return None;
        }
        let idx = (x - self.read_start) as usize * self.height as usize + y as usize;
        self.tiles.get(idx)
    }

    fn validate(&self) -> Result<(), String> {
        let columns = self.read_end.saturating_sub(self.read_start) as usize;
        let expected = columns * self.height as usize;
        if self.tiles.len() != expected {
            return Err(format!(
                "window holds {} tiles, expected {expected}",
                self.tiles.len()
            ));
        }
        let range = self.range;
        if range.start_x >= range.end_x
            || range.start_x < self.read_start
            || range.end_x > self.read_end
            || range.end_x > self.grid_width
        {
            return Err(format!(
                "columns {}..{} fall outside read window {}..{}",
                range.start_x, range.end_x, self.read_start, self.read_end
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterPoint {
    pub pos: TilePos,
    pub kind: TileKind,
}

/// Same-kind adjacency between an owned cell and a cell in a halo column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Seam {
    pub inner: TilePos,
    pub outer: TilePos,
}

/// Components found in one chunk.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkOutput {
    /// Root cell (flattened `x * height + y`) to member points.
    pub groups: BTreeMap<u64, Vec<ClusterPoint>>,
    pub seams: Vec<Seam>,
}

impl ChunkOutput {
    pub fn point_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Labels the owned columns of `window` with union-find over 4-neighbors.
pub fn cluster_chunk(window: &ChunkWindow) -> Result<ChunkOutput, ClusterError> {
    let range = window.range;
    window
        .validate()
        .map_err(|message| ClusterError::ChunkProcessing {
            chunk: range.index,
            start_x: range.start_x,
            end_x: range.end_x,
            message,
        })?;

    let height = window.height;
    let owned = range.width() as usize * height as usize;
    let local =
        |pos: TilePos| (pos.x - range.start_x) as usize * height as usize + pos.y as usize;
    let kind_at = |pos: TilePos| cluster_kind(window.tile(pos.x, pos.y));

    let mut sets = UnionFind::new(owned);
    let mut seams = Vec::new();

    for x in range.start_x..range.end_x {
        for y in 0..height {
            let pos = TilePos::new(x, y);
            let Some(kind) = kind_at(pos) else {
                continue;
            };

            for neighbor in neighbors(pos, window.grid_width, height) {
                if kind_at(neighbor) != Some(kind) {
                    continue;
                }
                if range.owns(neighbor.x) {
                    sets.union(local(pos), local(neighbor));
                } else {
                    seams.push(Seam {
                        inner: pos,
                        outer: neighbor,
                    });
                }
            }
        }
    }

    let mut groups: BTreeMap<u64, Vec<ClusterPoint>> = BTreeMap::new();
    for x in range.start_x..range.end_x {
        for y in 0..height {
            let pos = TilePos::new(x, y);
            let Some(kind) = kind_at(pos) else {
                continue;
            };
            let root = sets.find(local(pos)) as u64;
            let root_key = range.start_x as u64 * height as u64 + root;
            groups
                .entry(root_key)
                .or_default()
                .push(ClusterPoint { pos, kind });
        }
    }

    Ok(ChunkOutput { groups, seams })
}

fn neighbors(pos: TilePos, width: u32, height: u32) -> impl Iterator<Item = TilePos> {
    let TilePos { x, y } = pos;
    [
        (x > 0).then(|| TilePos::new(x - 1, y)),
        (x + 1 < width).then(|| TilePos::new(x + 1, y)),
        (y > 0).then(|| TilePos::new(x, y - 1)),
        (y + 1 < height).then(|| TilePos::new(x, y + 1)),
    ]
    .into_iter()
    .flatten()
}
