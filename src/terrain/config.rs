//! Terrain tuning shared by the volume and every chunk.

use serde::{Deserialize, Serialize};

/// Configuration passed to the volume and copied into each chunk at creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Chunks per axis. Field dimensions are rounded down to a multiple of this.
    pub grid_size: usize,
    /// Densities below this value are solid.
    pub surface_value: u8,
    /// Density written by fully destructive edits (air).
    pub destroy_value: u8,
    /// Returned by volume-level reads outside the field.
    pub volume_out_of_bounds: u8,
    /// Returned by chunk corner reads outside the field (reads as air).
    pub chunk_out_of_bounds: u8,
    /// Extra radius, in samples, around a sphere edit whose chunks are queued.
    pub dirty_margin: f32,
    /// Depth of each chunk's triangle index.
    pub triangle_index_depth: u32,
    /// Triangles a leaf of the chunk triangle index holds before splitting.
    pub triangle_index_leaf: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            grid_size: 16,
            surface_value: 126,
            destroy_value: 255,
            volume_out_of_bounds: 100,
            chunk_out_of_bounds: 255,
            dirty_margin: 2.0,
            triangle_index_depth: 3,
            triangle_index_leaf: 5,
        }
    }
}

impl TerrainConfig {
    /// Depth of the chunk index: one level per halving of the grid, less one.
    pub fn chunk_index_depth(&self) -> u32 {
        let levels = (self.grid_size.max(1) as f32).log2().floor() as i64 - 1;
        levels.max(1) as u32
    }

    /// Size of one grid step in volume-local units.
    pub fn grid_step(&self) -> f32 {
        1.0 / self.grid_size as f32
    }
}
