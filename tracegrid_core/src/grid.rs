//! The "SPACE" Engine - square grid partition of the unit square
//!
//! Maps continuous coordinates in [0,1]×[0,1] to discrete tiles. Users that
//! land on the same tile during a step are treated as having been in contact.

use crate::error::{TraceError, TraceResult};
use crate::types::TileId;
use serde::{Deserialize, Serialize};

/// Square grid with `resolution * resolution` tiles.
///
/// Each axis carries `resolution` cut points evenly spaced over [0,1],
/// endpoints included. A coordinate falls in the bin of the greatest cut
/// point that is ≤ the coordinate, so the last bin only holds the value 1.0.
///
/// Immutable after construction; share it with `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPartition {
    /// Tiles per axis (N)
    resolution: usize,

    /// N ascending cut points in [0,1]
    boundaries: Vec<f64>,

    /// N×N row-major table of tile ids
    tiles: Vec<TileId>,
}

impl GridPartition {
    /// Creates a new partition with `resolution` tiles per axis.
    pub fn new(resolution: usize) -> TraceResult<Self> {
        if resolution == 0 {
            return Err(TraceError::InvalidResolution(resolution));
        }

        let boundaries = if resolution == 1 {
            vec![0.0]
        } else {
            let last = (resolution - 1) as f64;
            (0..resolution).map(|i| i as f64 / last).collect()
        };

        let tiles = (0..resolution * resolution).map(TileId).collect();

        Ok(Self {
            resolution,
            boundaries,
            tiles,
        })
    }

    /// Returns the tile containing `(x, y)`.
    ///
    /// `x` selects the row and `y` the column. Points outside the unit
    /// square, or with a NaN component, are rejected rather than clamped.
    pub fn tile_id(&self, x: f64, y: f64) -> TraceResult<TileId> {
        if !Self::in_domain(x) || !Self::in_domain(y) {
            return Err(TraceError::out_of_range(x, y));
        }

        let row = self.bin(x);
        let col = self.bin(y);
        Ok(self.tiles[row * self.resolution + col])
    }

    /// Returns the tile at `(row, col)`, if inside the grid.
    pub fn tile_at(&self, row: usize, col: usize) -> Option<TileId> {
        if row >= self.resolution || col >= self.resolution {
            return None;
        }
        self.tiles.get(row * self.resolution + col).copied()
    }

    /// Inverse of `tile_at`.
    pub fn cell_of(&self, tile: TileId) -> Option<(usize, usize)> {
        if tile.0 >= self.tile_count() {
            return None;
        }
        Some((tile.0 / self.resolution, tile.0 % self.resolution))
    }

    pub fn resolution(&self) -> usize {
        self.resolution
    }

    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn tiles(&self) -> &[TileId] {
        &self.tiles
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    fn in_domain(v: f64) -> bool {
        (0.0..=1.0).contains(&v)
    }

    fn bin(&self, v: f64) -> usize {
        // boundaries[0] == 0.0 and v >= 0.0, so at least one cut point matches
        self.boundaries.partition_point(|&b| b <= v) - 1
    }
}
