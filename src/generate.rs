//! Seeded demo worlds
//!
//! Grows random blobs of water, rock, ore and forest on a grass field. This is
//! a fixture for demos, stress tests and benchmarks, not terrain generation:
//! the same `(width, height, seed, densities)` always yields the same grid.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::grid::{Grid, TilePos};
use crate::tile::{Tile, TileKind};

/// Feature counts per 1,000 tiles and the largest blob size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Densities {
    #[serde(default = "default_lakes")]
    pub lakes: f32,
    #[serde(default = "default_outcrops")]
    pub outcrops: f32,
    #[serde(default = "default_veins")]
    pub veins: f32,
    #[serde(default = "default_forests")]
    pub forests: f32,
    #[serde(default = "default_berries")]
    pub berries: f32,
    #[serde(default = "default_max_blob")]
    pub max_blob: u32,
}

fn default_lakes() -> f32 {
    1.5
}

fn default_outcrops() -> f32 {
    2.0
}

fn default_veins() -> f32 {
    2.5
}

fn default_forests() -> f32 {
    4.0
}

fn default_berries() -> f32 {
    1.0
}

fn default_max_blob() -> u32 {
    24
}

impl Default for Densities {
    fn default() -> Self {
        Self {
            lakes: default_lakes(),
            outcrops: default_outcrops(),
            veins: default_veins(),
            forests: default_forests(),
            berries: default_berries(),
            max_blob: default_max_blob(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Feature {
    Lake,
    Outcrop,
    Vein,
    Forest,
    Berries,
}

pub fn scatter(width: u32, height: u32, seed: u64, densities: &Densities) -> Grid {
    let mut grid = Grid::new(width, height);
    if width == 0 || height == 0 {
        return grid;
    }
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let per_mille = grid.tile_count() as f32 / 1_000.0;

    let plan = [
        (Feature::Lake, densities.lakes),
        (Feature::Outcrop, densities.outcrops),
        (Feature::Vein, densities.veins),
        (Feature::Forest, densities.forests),
        (Feature::Berries, densities.berries),
    ];
    for (feature, density) in plan {
        let count = (density.max(0.0) * per_mille).round() as u32;
        for _ in 0..count {
            let size = rng.gen_range(1..=densities.max_blob.max(1));
            grow_blob(&mut grid, &mut rng, feature, size);
        }
    }
    grid
}

fn grow_blob(grid: &mut Grid, rng: &mut ChaCha8Rng, feature: Feature, size: u32) {
    let mut cursor = TilePos::new(
        rng.gen_range(0..grid.width()),
        rng.gen_range(0..grid.height()),
    );
    let ore = if rng.gen_bool(0.5) {
        TileKind::CopperOre
    } else {
        TileKind::IronOre
    };

    for _ in 0..size {
        let tile = match feature {
            Feature::Lake => Tile::new(TileKind::Water),
            Feature::Outcrop => Tile::new(TileKind::Rock),
            Feature::Vein => Tile::with_mask(TileKind::Rock, ore),
            Feature::Forest => {
                let part = if rng.gen_bool(0.6) {
                    TileKind::Leaf
                } else {
                    TileKind::Wood
                };
                Tile::with_mask(TileKind::Grass, part)
            }
            Feature::Berries => Tile::with_mask(TileKind::Grass, TileKind::Berry),
        };
        grid.set_tile(cursor, tile);

        let neighbors = grid.neighbors(cursor);
        if let Some(&next) = neighbors.get(rng.gen_range(0..neighbors.len().max(1))) {
            cursor = next;
        }
    }
}
