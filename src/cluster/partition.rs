//! Column partitioning for parallel chunk work

use serde::Serialize;

/// Columns `[start_x, end_x)` owned by one chunk task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkRange {
    pub index: usize,
    pub start_x: u32,
    pub end_x: u32,
}

impl ChunkRange {
    pub fn width(&self) -> u32 {
        self.end_x - self.start_x
    }

    pub fn owns(&self, x: u32) -> bool {
        x >= self.start_x && x < self.end_x
    }

    /// Columns the chunk may read: its own plus one on each side, clamped to `grid_width`.
    pub fn read_window(&self, grid_width: u32) -> (u32, u32) {
        (
            self.start_x.saturating_sub(1),
            (self.end_x + 1).min(grid_width),
        )
    }
}

/// Task count: the requested count (or available parallelism), at least 1 and at most `width`.
pub fn worker_count(requested: Option<usize>, width: u32) -> usize {
    let hardware = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let wanted = requested.unwrap_or(hardware);
    wanted.min(width as usize).max(1)
}

/// Splits `[0, width)` into at most `workers` contiguous ranges of
/// `ceil(width / workers)` columns. The last range may be shorter; ranges that
/// would start past the edge are dropped.
pub fn partition_columns(width: u32, workers: usize) -> Vec<ChunkRange> {
    if width == 0 {
        return Vec::new();
    }
    let workers = workers.max(1) as u32;
    let chunk_width = width.div_ceil(workers);

    (0..workers)
        .map(|slot| slot * chunk_width)
        .take_while(|&start_x| start_x < width)
        .enumerate()
        .map(|(index, start_x)| ChunkRange {
            index,
            start_x,
            end_x: (start_x + chunk_width).min(width),
        })
        .collect()
}
