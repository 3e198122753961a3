//! Error types for clustering, persistence and layout parsing

use std::time::Duration;

/// Failures of the clustering engine.
#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    /// A chunk's labeling failed (worker error or panic).
    #[error("chunk {chunk} (columns {start_x}..{end_x}) failed: {message}")]
    ChunkProcessing {
        chunk: usize,
        start_x: u32,
        end_x: u32,
        message: String,
    },

    /// A chunk task ran past its time budget and was abandoned.
    #[error("chunk {chunk} (columns {start_x}..{end_x}) timed out after {timeout:?}")]
    ChunkTimeout {
        chunk: usize,
        start_x: u32,
        end_x: u32,
        timeout: Duration,
    },

    /// Caller-supplied data does not fit the grid.
    #[error("dimension mismatch on {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Another build is still running on this builder.
    #[error("a clustering build is already in progress")]
    BuildInProgress,

    /// The map has no tile set bound yet.
    #[error("no tile set has been initialized")]
    NoTileSet,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ClusterError {
    /// Chunk-level failures abort a parallel build and may be retried sequentially.
    pub fn is_chunk_failure(&self) -> bool {
        matches!(
            self,
            Self::ChunkProcessing { .. } | Self::ChunkTimeout { .. }
        )
    }
}

/// Failures of a [`crate::store::ClusterStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cluster store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cluster store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no clusters stored for tile set '{0}'")]
    NotFound(String),
}

/// Failures while reading an ASCII layout.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LayoutError {
    #[error("layout has no rows")]
    Empty,

    #[error("row {row} has {got} columns, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        got: usize,
    },

    #[error("unknown glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
}
