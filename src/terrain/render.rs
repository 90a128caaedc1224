//! Submission of visible chunks to the renderer.
//!
//! The volume never touches GPU resources. It culls its chunk index against
//! the camera frustum and hands each visible chunk's vertex stream to a
//! [`RenderSink`], once per pass.

use crate::core::types::Mat4;
use crate::math::Frustum;
use crate::spatial::SpatialIndex;
use super::chunk::{Chunk, ChunkCoord};
use super::volume::TerrainVolume;

/// Passes a chunk can be submitted to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderPass {
    Opaque,
    Shadow,
    /// Optional highlight pass, enabled with [`TerrainVolume::set_draw_overlay`]
    Overlay,
}

/// A visible chunk ready for upload
#[derive(Clone, Copy, Debug)]
pub struct ChunkDraw<'a> {
    pub coord: ChunkCoord,
    /// Chunk space to world space
    pub world_matrix: Mat4,
    /// Raw `TerrainVertex` bytes
    pub vertices: &'a [u8],
    pub vertex_count: usize,
}

/// Receives draw submissions from [`TerrainVolume::draw`].
pub trait RenderSink {
    fn submit(&mut self, pass: RenderPass, chunk: &ChunkDraw<'_>);
}

impl TerrainVolume {
    pub fn draw_overlay(&self) -> bool {
        self.draw_overlay
    }

    pub fn set_draw_overlay(&mut self, enabled: bool) {
        self.draw_overlay = enabled;
    }

    /// Chunks whose bounds intersect a world-space frustum, in grid order.
    pub fn visible_chunks(&self, frustum: &Frustum) -> Vec<&Chunk> {
        let local = frustum.transformed(&self.transform().matrix());
        let mut visible: Vec<usize> = self
            .chunk_index()
            .cull_by_frustum(&local)
            .into_iter()
            .copied()
            .collect();
        visible.sort_unstable();
        visible.into_iter().map(|i| &self.chunks()[i]).collect()
    }

    /// Submit every visible chunk to the opaque and shadow passes, and to the
    /// overlay pass when enabled. Returns the number of chunks submitted.
    pub fn draw(&self, frustum: &Frustum, sink: &mut dyn RenderSink) -> usize {
        let volume_matrix = self.transform().matrix();
        let visible = self.visible_chunks(frustum);

        for chunk in &visible {
            let draw = ChunkDraw {
                coord: chunk.coord(),
                world_matrix: volume_matrix * chunk.transform().matrix(),
                vertices: chunk.vertex_bytes(),
                vertex_count: chunk.vertex_count(),
            };
            sink.submit(RenderPass::Opaque, &draw);
            sink.submit(RenderPass::Shadow, &draw);
            if self.draw_overlay {
                sink.submit(RenderPass::Overlay, &draw);
            }
        }

        log::trace!("Submitted {} of {} chunks", visible.len(), self.chunks().len());
        visible.len()
    }
}
