//! Chunked terrain volume.
//!
//! The volume owns the density field and a `grid_size`^3 grid of chunks that
//! tile its local unit cube. Edits write the field and queue the chunks they
//! touch; [`TerrainVolume::remesh_dirty`] re-triangulates exactly those chunks
//! on the rayon pool and then rebuilds the chunk index used for raycasts and
//! frustum culling.
//!
//! Coordinate spaces:
//! - world: the scene
//! - local: the volume's unit cube, `inverse(world matrix) * p`
//! - data: sample coordinates, `local * field size`

use std::time::Instant;

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::transform::Transform;
use crate::core::types::{IVec3, Quat, Result, Vec3};
use crate::math::Aabb;
use crate::procgen::carver::StructurePoint;
use crate::spatial::{Octree, SpatialIndex};
use super::chunk::{Chunk, ChunkCoord};
use super::config::TerrainConfig;
use super::decor::{DecorCollection, TerrainPalette};
use super::density::DensityField;
use super::dirty::DirtyQueue;

/// Density field, chunk grid and the bookkeeping that ties them together.
#[derive(Debug)]
pub struct TerrainVolume {
    config: TerrainConfig,
    transform: Transform,
    field: DensityField,
    /// Linear index `x + y * n + z * n * n`
    chunks: Vec<Chunk>,
    dirty: DirtyQueue,
    /// Non-empty chunks by linear index
    chunk_index: Octree<usize>,
    physics_awake: Vec<ChunkCoord>,
    pub(crate) decor: Vec<DecorCollection>,
    pub(crate) palette: TerrainPalette,
    /// Submit chunks to the overlay pass as well
    pub(crate) draw_overlay: bool,
    pub(crate) structure_points: Vec<StructurePoint>,
    pub(crate) spawn_points: Vec<Vec3>,
    pub(crate) seed: u32,
}

impl TerrainVolume {
    /// Create a volume of `size` samples with a uniform world `scale` on its
    /// longest axis.
    ///
    /// Each dimension is rounded down to a multiple of `config.grid_size`.
    /// Shorter axes get proportionally smaller world extents so samples stay
    /// cubic. The field starts as air and every chunk starts empty.
    pub fn new(size: [usize; 3], scale: f32, config: TerrainConfig) -> Result<Self> {
        let grid = config.grid_size;
        if grid == 0 {
            return Err(Error::InvalidDimensions { size, grid });
        }
        let rounded = size.map(|s| s - s % grid);
        if rounded.iter().any(|&s| s == 0) {
            return Err(Error::InvalidDimensions { size, grid });
        }
        if !(scale > 0.0 && scale.is_finite()) {
            return Err(Error::Terrain(format!("scale must be positive, got {scale}")));
        }

        let longest = *rounded.iter().max().unwrap_or(&1) as f32;
        let extent = Vec3::new(rounded[0] as f32, rounded[1] as f32, rounded[2] as f32) / longest;
        let transform = Transform::from_scale(extent * scale);

        let stride = IVec3::new(
            (rounded[0] / grid) as i32,
            (rounded[1] / grid) as i32,
            (rounded[2] / grid) as i32,
        );
        let n = grid as i32;
        let mut chunks = Vec::with_capacity(grid * grid * grid);
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    chunks.push(Chunk::new(ChunkCoord::new(x, y, z), stride, config.clone()));
                }
            }
        }

        log::info!(
            "Initialized terrain {}x{}x{} ({} chunks of {}x{}x{} samples)",
            rounded[0], rounded[1], rounded[2],
            chunks.len(), stride.x, stride.y, stride.z,
        );

        let mut volume = Self {
            field: DensityField::new(rounded, config.destroy_value),
            dirty: DirtyQueue::new(grid),
            chunk_index: Octree::default(),
            config,
            transform,
            chunks,
            physics_awake: Vec::new(),
            decor: Vec::new(),
            palette: TerrainPalette::default(),
            draw_overlay: false,
            structure_points: Vec::new(),
            spawn_points: Vec::new(),
            seed: 0,
        };
        volume.rebuild_chunk_index();
        Ok(volume)
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    pub fn field(&self) -> &DensityField {
        &self.field
    }

    pub(crate) fn field_mut(&mut self) -> &mut DensityField {
        &mut self.field
    }

    /// Field dimensions in samples
    pub fn size(&self) -> [usize; 3] {
        self.field.size()
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Move the volume. The scale set at construction is kept.
    pub fn set_placement(&mut self, position: Vec3, rotation: Quat) {
        self.transform.position = position;
        self.transform.rotation = rotation;
    }

    /// Uniform scale the volume was created with (world extent of the longest axis)
    pub fn scale(&self) -> f32 {
        self.transform.scale.max_element()
    }

    /// Seed of the last procedural generation
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Samples per chunk along each axis
    pub fn chunk_stride(&self) -> IVec3 {
        let n = self.config.grid_size;
        let [sx, sy, sz] = self.field.size();
        IVec3::new((sx / n) as i32, (sy / n) as i32, (sz / n) as i32)
    }

    /// World length of one sample along x
    pub fn voxel_length(&self) -> f32 {
        self.transform.scale.x / self.field.size()[0] as f32
    }

    pub fn world_to_local(&self, world: Vec3) -> Vec3 {
        self.transform.inverse_matrix().transform_point3(world)
    }

    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.transform.matrix().transform_point3(local)
    }

    pub fn world_to_data(&self, world: Vec3) -> Vec3 {
        self.world_to_local(world) * self.field.size_f32()
    }

    pub fn data_to_world(&self, data: Vec3) -> Vec3 {
        self.local_to_world(data / self.field.size_f32())
    }

    /// Write one sample. Out-of-range writes are ignored.
    pub fn set_pixel(&mut self, pixel: IVec3, value: u8) {
        self.field.set(pixel, value);
    }

    /// Read one sample, or the volume sentinel outside the field.
    pub fn get_pixel(&self, pixel: IVec3) -> u8 {
        self.field.get_or(pixel, self.config.volume_out_of_bounds)
    }

    /// Trilinear read at a fractional data position
    pub fn sample_data(&self, data: Vec3) -> f32 {
        self.field.sample(data, self.config.volume_out_of_bounds)
    }

    fn linear_index(&self, coord: ChunkCoord) -> Option<usize> {
        let n = self.config.grid_size as i32;
        let c = coord.as_ivec3();
        if c.min_element() < 0 || c.max_element() >= n {
            return None;
        }
        Some((c.x + c.y * n + c.z * n * n) as usize)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub(crate) fn chunks_mut(&mut self) -> &mut [Chunk] {
        &mut self.chunks
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.linear_index(coord).map(|i| &self.chunks[i])
    }

    pub(crate) fn chunk_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.linear_index(coord).map(|i| &mut self.chunks[i])
    }

    /// Chunk owning a sample
    pub fn chunk_of_pixel(&self, pixel: IVec3) -> ChunkCoord {
        ChunkCoord::from(pixel.div_euclid(self.chunk_stride()))
    }

    /// Queue a chunk for remeshing. Returns true if it was newly queued.
    pub fn queue_chunk(&mut self, coord: ChunkCoord) -> bool {
        self.dirty.push(coord)
    }

    /// Queue the chunk owning `pixel`, plus each neighbour sharing the face
    /// the pixel lies on. Returns true if any chunk was newly queued.
    pub fn queue_chunk_by_pixel(&mut self, pixel: IVec3) -> bool {
        let stride = self.chunk_stride();
        let coord = self.chunk_of_pixel(pixel);
        let rest = pixel.rem_euclid(stride);

        let mut queued = self.queue_chunk(coord);
        for axis in 0..3 {
            let mut step = IVec3::ZERO;
            step[axis] = 1;
            if rest[axis] == 0 {
                queued |= self.queue_chunk(ChunkCoord::from(coord.as_ivec3() - step));
            } else if rest[axis] == stride[axis] - 1 {
                queued |= self.queue_chunk(ChunkCoord::from(coord.as_ivec3() + step));
            }
        }
        queued
    }

    /// Chunks waiting for a remesh, in queue order
    pub fn dirty_chunks(&self) -> &[ChunkCoord] {
        self.dirty.as_slice()
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Remesh every chunk on the worker pool, then rebuild the chunk index.
    pub fn remesh_all(&mut self) {
        let start = Instant::now();
        let field = &self.field;
        self.chunks.par_iter_mut().for_each(|chunk| chunk.remesh(field));
        self.dirty.clear();
        self.rebuild_chunk_index();

        log::info!(
            "Remeshed {} chunks ({} triangles) in {:.1}ms",
            self.chunks.len(),
            self.triangle_count(),
            start.elapsed().as_secs_f64() * 1000.0,
        );
    }

    /// Remesh queued chunks only. A no-op when nothing is queued.
    ///
    /// Returns the number of chunks remeshed.
    pub fn remesh_dirty(&mut self) -> usize {
        if self.dirty.is_empty() {
            return 0;
        }
        let start = Instant::now();
        let count = self.dirty.len();
        let field = &self.field;
        let dirty = &self.dirty;
        self.chunks
            .par_iter_mut()
            .filter(|chunk| dirty.contains(chunk.coord()))
            .for_each(|chunk| chunk.remesh(field));
        self.dirty.clear();
        self.rebuild_chunk_index();

        log::debug!(
            "Remeshed {} dirty chunks in {:.2}ms",
            count,
            start.elapsed().as_secs_f64() * 1000.0,
        );
        count
    }

    /// Rebuild the broad-phase index over non-empty chunks.
    fn rebuild_chunk_index(&mut self) {
        let n = self.config.grid_size;
        self.chunk_index.initialize(
            Aabb::new(Vec3::ZERO, Vec3::ONE),
            self.config.chunk_index_depth(),
            1,
            n * n * n,
        );
        for (i, chunk) in self.chunks.iter().enumerate() {
            if !chunk.is_empty() {
                self.chunk_index.insert(chunk.bounds(), i, false);
            }
        }
        self.chunk_index.rebalance();
    }

    pub(crate) fn chunk_index(&self) -> &Octree<usize> {
        &self.chunk_index
    }

    pub(crate) fn physics_awake(&self) -> &[ChunkCoord] {
        &self.physics_awake
    }

    pub(crate) fn physics_awake_mut(&mut self) -> &mut Vec<ChunkCoord> {
        &mut self.physics_awake
    }

    pub fn triangle_count(&self) -> usize {
        self.chunks.iter().map(Chunk::triangle_count).sum()
    }

    /// Bytes held by all chunk vertex streams
    pub fn triangle_mesh_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.vertex_bytes().len()).sum()
    }

    /// Bytes held by the density field
    pub fn density_bytes(&self) -> usize {
        self.field.byte_size()
    }

    /// Carve points recorded by the last cave generation
    pub fn structure_points(&self) -> &[StructurePoint] {
        &self.structure_points
    }

    /// Player spawn positions (volume-local units scaled to world extent)
    pub fn spawn_points(&self) -> &[Vec3] {
        &self.spawn_points
    }
}
