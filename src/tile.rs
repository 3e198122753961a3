//! Tile model and the effective-kind rules used by clustering

use serde::{Deserialize, Serialize};

/// Closed set of tile kinds. Every kind can own clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileKind {
    Grass,
    Water,
    Rock,
    CopperOre,
    IronOre,
    Wood,
    Leaf,
    Tree,
    Berry,
    Structure,
}

impl TileKind {
    pub const COUNT: usize = 10;

    pub const ALL: [TileKind; Self::COUNT] = [
        TileKind::Grass,
        TileKind::Water,
        TileKind::Rock,
        TileKind::CopperOre,
        TileKind::IronOre,
        TileKind::Wood,
        TileKind::Leaf,
        TileKind::Tree,
        TileKind::Berry,
        TileKind::Structure,
    ];

    /// Dense slot used by fixed-size per-kind tables.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            TileKind::Grass => "grass",
            TileKind::Water => "water",
            TileKind::Rock => "rock",
            TileKind::CopperOre => "copper_ore",
            TileKind::IronOre => "iron_ore",
            TileKind::Wood => "wood",
            TileKind::Leaf => "leaf",
            TileKind::Tree => "tree",
            TileKind::Berry => "berry",
            TileKind::Structure => "structure",
        }
    }

    /// Wood and leaf are stored separately but play as a single tree kind.
    pub fn is_tree_part(self) -> bool {
        matches!(self, TileKind::Wood | TileKind::Leaf)
    }

    pub fn display_kind(self) -> TileKind {
        if self.is_tree_part() {
            TileKind::Tree
        } else {
            self
        }
    }
}

/// Overlay drawn on top of a base tile (a tree on grass, an ore seam in rock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayMask {
    pub kind: TileKind,
    #[serde(default)]
    pub variant: u8,
    #[serde(default)]
    pub tint: Option<[u8; 3]>,
}

impl OverlayMask {
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            variant: 0,
            tint: None,
        }
    }
}

/// Metadata carried for gameplay outside clustering (growth, upgrades).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub target: TileKind,
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub kind: TileKind,
    #[serde(default)]
    pub mask: Option<OverlayMask>,
    /// Impassable for movement; has no effect on clustering.
    #[serde(default)]
    pub boundary: bool,
    #[serde(default)]
    pub promotion: Option<Promotion>,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Self {
            kind,
            mask: None,
            boundary: false,
            promotion: None,
        }
    }

    pub fn with_mask(kind: TileKind, mask: TileKind) -> Self {
        Self {
            mask: Some(OverlayMask::new(mask)),
            ..Self::new(kind)
        }
    }

    /// Kind used for adjacency tests.
    ///
    /// A wood or leaf overlay resolves to [`TileKind::Tree`], any other overlay
    /// wins over the base kind, and a bare tile keeps its own kind.
    pub fn effective_kind(&self) -> TileKind {
        match &self.mask {
            Some(mask) if mask.kind.is_tree_part() => TileKind::Tree,
            Some(mask) => mask.kind,
            None => self.kind,
        }
    }

    /// Bare grass is background and never joins a cluster.
    pub fn is_background(&self) -> bool {
        self.kind == TileKind::Grass && self.mask.is_none()
    }

    pub fn cluster_kind(&self) -> Option<TileKind> {
        if self.is_background() {
            None
        } else {
            Some(self.effective_kind())
        }
    }
}

/// Clustering kind for a possibly absent tile; absent reads as background.
pub fn cluster_kind(tile: Option<&Tile>) -> Option<TileKind> {
    tile.and_then(Tile::cluster_kind)
}
