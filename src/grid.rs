//! Tile grid: owns tile data, column-major

use serde::{Deserialize, Serialize};

use crate::error::ClusterError;
use crate::tile::{OverlayMask, Tile, TileKind};

/// Tile position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TilePos {
    pub x: u32,
    pub y: u32,
}

impl TilePos {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Packed lookup key; `from_key` reverses it exactly.
    pub fn key(self) -> u64 {
        ((self.x as u64) << 32) | self.y as u64
    }

    pub fn from_key(key: u64) -> Self {
        Self {
            x: (key >> 32) as u32,
            y: key as u32,
        }
    }
}

/// Width x height tile matrix. Tiles are stored column by column so a run of
/// columns is one contiguous slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl Grid {
    /// A grid of bare grass.
    pub fn new(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            tiles: vec![Tile::new(TileKind::Grass); count],
        }
    }

    /// Builds a grid from column-major tiles.
    pub fn from_columns(width: u32, height: u32, tiles: Vec<Tile>) -> Result<Self, ClusterError> {
        let expected = width as usize * height as usize;
        if tiles.len() != expected {
            return Err(ClusterError::DimensionMismatch {
                what: "tile count",
                expected,
                got: tiles.len(),
            });
        }
        Ok(Self {
            width,
            height,
            tiles,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Flattened index, `x * height + y`.
    pub fn index_of(&self, pos: TilePos) -> Option<usize> {
        if self.contains(pos) {
            Some(pos.x as usize * self.height as usize + pos.y as usize)
        } else {
            None
        }
    }

    pub fn get_tile(&self, pos: TilePos) -> Option<&Tile> {
        self.index_of(pos).map(|idx| &self.tiles[idx])
    }

    pub fn get_tile_mut(&mut self, pos: TilePos) -> Option<&mut Tile> {
        self.index_of(pos).map(move |idx| &mut self.tiles[idx])
    }

    pub fn set_tile(&mut self, pos: TilePos, tile: Tile) -> bool {
        match self.get_tile_mut(pos) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    /// Removes and returns the overlay at `pos`.
    pub fn clear_mask(&mut self, pos: TilePos) -> Option<OverlayMask> {
        self.get_tile_mut(pos).and_then(|tile| tile.mask.take())
    }

    /// Tiles of columns `[start_x, end_x)`, clamped to the grid.
    pub fn columns(&self, start_x: u32, end_x: u32) -> &[Tile] {
        let start_x = start_x.min(self.width) as usize;
        let end_x = end_x.min(self.width) as usize;
        let height = self.height as usize;
        &self.tiles[start_x * height..end_x * height]
    }

    /// Writes overlays into the `width` x `height` region starting at `origin`.
    ///
    /// Masks are row-major within the region. Nothing is written unless the
    /// mask count and the region both fit.
    pub fn apply_overlays(
        &mut self,
        origin: TilePos,
        width: u32,
        height: u32,
        masks: Vec<Option<OverlayMask>>,
    ) -> Result<(), ClusterError> {
        let expected = width as usize * height as usize;
        if masks.len() != expected {
            return Err(ClusterError::DimensionMismatch {
                what: "overlay count",
                expected,
                got: masks.len(),
            });
        }
        let right = origin.x as usize + width as usize;
        if right > self.width as usize {
            return Err(ClusterError::DimensionMismatch {
                what: "region right edge",
                expected: self.width as usize,
                got: right,
            });
        }
        let bottom = origin.y as usize + height as usize;
        if bottom > self.height as usize {
            return Err(ClusterError::DimensionMismatch {
                what: "region bottom edge",
                expected: self.height as usize,
                got: bottom,
            });
        }

        for (offset, mask) in masks.into_iter().enumerate() {
            let local_x = (offset % width as usize) as u32;
            let local_y = (offset / width as usize) as u32;
            let pos = TilePos::new(origin.x + local_x, origin.y + local_y);
            if let Some(tile) = self.get_tile_mut(pos) {
                tile.mask = mask;
            }
        }
        Ok(())
    }

    /// Get neighboring tiles (4-connectivity)
    pub fn neighbors(&self, pos: TilePos) -> Vec<TilePos> {
        let mut neighbors = Vec::with_capacity(4);

        // North
        if pos.y > 0 {
            neighbors.push(TilePos::new(pos.x, pos.y - 1));
        }
        // South
        if pos.y + 1 < self.height {
            neighbors.push(TilePos::new(pos.x, pos.y + 1));
        }
        // West
        if pos.x > 0 {
            neighbors.push(TilePos::new(pos.x - 1, pos.y));
        }
        // East
        if pos.x + 1 < self.width {
            neighbors.push(TilePos::new(pos.x + 1, pos.y));
        }

        neighbors
    }

    pub fn positions(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| TilePos::new(x, y)))
    }
}
