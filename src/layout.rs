//! ASCII layouts for hand-written worlds and test fixtures
//!
//! One character per tile, one string per row (row index is `y`).
//!
//! | glyph | tile |
//! |-------|------|
//! | `.` | grass |
//! | `~` | water |
//! | `#` | rock |
//! | `c` / `i` | copper / iron ore |
//! | `w` / `l` / `t` | bare wood / leaf / tree |
//! | `b` | berry |
//! | `s` | structure |
//! | `X` | impassable structure |
//! | `T` / `L` / `B` | grass with a wood / leaf / berry overlay |
//! | `C` / `I` | rock with a copper / iron ore overlay |

use crate::error::LayoutError;
use crate::grid::Grid;
use crate::tile::{Tile, TileKind};

pub fn glyph_tile(glyph: char) -> Option<Tile> {
    let tile = match glyph {
        '.' => Tile::new(TileKind::Grass),
        '~' => Tile::new(TileKind::Water),
        '#' => Tile::new(TileKind::Rock),
        'c' => Tile::new(TileKind::CopperOre),
        'i' => Tile::new(TileKind::IronOre),
        'w' => Tile::new(TileKind::Wood),
        'l' => Tile::new(TileKind::Leaf),
        't' => Tile::new(TileKind::Tree),
        'b' => Tile::new(TileKind::Berry),
        's' => Tile::new(TileKind::Structure),
        'X' => Tile {
            boundary: true,
            ..Tile::new(TileKind::Structure)
        },
        'T' => Tile::with_mask(TileKind::Grass, TileKind::Wood),
        'L' => Tile::with_mask(TileKind::Grass, TileKind::Leaf),
        'B' => Tile::with_mask(TileKind::Grass, TileKind::Berry),
        'C' => Tile::with_mask(TileKind::Rock, TileKind::CopperOre),
        'I' => Tile::with_mask(TileKind::Rock, TileKind::IronOre),
        _ => return None,
    };
    Some(tile)
}

/// Glyph for the clustering-relevant look of a tile.
pub fn tile_glyph(tile: &Tile) -> char {
    if tile.boundary && tile.kind == TileKind::Structure && tile.mask.is_none() {
        return 'X';
    }
    match (tile.kind, tile.mask.as_ref().map(|mask| mask.kind)) {
        (_, Some(TileKind::Wood)) => 'T',
        (_, Some(TileKind::Leaf)) => 'L',
        (_, Some(TileKind::Berry)) => 'B',
        (_, Some(TileKind::CopperOre)) => 'C',
        (_, Some(TileKind::IronOre)) => 'I',
        (_, Some(_)) => '?',
        (TileKind::Grass, None) => '.',
        (TileKind::Water, None) => '~',
        (TileKind::Rock, None) => '#',
        (TileKind::CopperOre, None) => 'c',
        (TileKind::IronOre, None) => 'i',
        (TileKind::Wood, None) => 'w',
        (TileKind::Leaf, None) => 'l',
        (TileKind::Tree, None) => 't',
        (TileKind::Berry, None) => 'b',
        (TileKind::Structure, None) => 's',
    }
}

impl Grid {
    pub fn from_rows<S: AsRef<str>>(rows: &[S]) -> Result<Grid, LayoutError> {
        let first = rows.first().ok_or(LayoutError::Empty)?;
        let width = first.as_ref().chars().count();
        if width == 0 {
            return Err(LayoutError::Empty);
        }
        let height = rows.len();

        let mut row_tiles = Vec::with_capacity(height);
        for (y, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            let got = row.chars().count();
            if got != width {
                return Err(LayoutError::Ragged {
                    row: y,
                    expected: width,
                    got,
                });
            }
            let tiles = row
                .chars()
                .enumerate()
                .map(|(x, glyph)| glyph_tile(glyph).ok_or(LayoutError::UnknownGlyph { glyph, x, y }))
                .collect::<Result<Vec<_>, _>>()?;
            row_tiles.push(tiles);
        }

        let mut grid = Grid::new(width as u32, height as u32);
        for (y, tiles) in row_tiles.into_iter().enumerate() {
            for (x, tile) in tiles.into_iter().enumerate() {
                grid.set_tile(crate::grid::TilePos::new(x as u32, y as u32), tile);
            }
        }
        Ok(grid)
    }

    /// Renders the grid back into layout rows.
    pub fn to_rows(&self) -> Vec<String> {
        (0..self.height())
            .map(|y| {
                (0..self.width())
                    .map(|x| {
                        self.get_tile(crate::grid::TilePos::new(x, y))
                            .map(tile_glyph)
                            .unwrap_or(' ')
                    })
                    .collect()
            })
            .collect()
    }
}
