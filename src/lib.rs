pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod grid;
pub mod layout;
pub mod map;
pub mod scheduler;
pub mod store;
pub mod tile;
pub mod web;

pub use cluster::{Cluster, ClusterId, ClusterIndex, ClusterSet};
pub use config::{ClusterConfig, WorldFile, WorldLoader};
pub use engine::{ClusterBuilder, ClusterEngine, RemovalOutcome};
pub use error::{ClusterError, StoreError};
pub use grid::{Grid, TilePos};
pub use map::TileMap;
pub use tile::{OverlayMask, Tile, TileKind};
