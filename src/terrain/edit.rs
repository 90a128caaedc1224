//! Density edits.
//!
//! Every edit converts its world-space shape into data space, rewrites the
//! samples inside it and queues the chunks it touched. Nothing is remeshed
//! until the caller runs [`TerrainVolume::remesh_dirty`].

use crate::core::types::{IVec3, Vec3};
use super::volume::TerrainVolume;

/// Gradient length below which a sample is treated as flat
const MIN_FLOW: f32 = 1e-4;
/// Gradients steeper than this against up are smoothed
const SMOOTH_TILT: f32 = 0.6;

const NEIGHBOURS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Linear remap of `value` from `[from_lo, from_hi]` to `[to_lo, to_hi]`
fn remap(value: f32, from_lo: f32, from_hi: f32, to_lo: f32, to_hi: f32) -> f32 {
    to_lo + (value - from_lo) * (to_hi - to_lo) / (from_hi - from_lo)
}

impl TerrainVolume {
    /// Inclusive sample range covering `[centre - extent, centre + extent]`,
    /// clamped to the field.
    fn sample_range(&self, centre: Vec3, extent: Vec3) -> (IVec3, IVec3) {
        let [sx, sy, sz] = self.size();
        let last = IVec3::new(sx as i32 - 1, sy as i32 - 1, sz as i32 - 1);
        let lo = (centre - extent).floor().as_ivec3().max(IVec3::ZERO);
        let hi = (centre + extent).ceil().as_ivec3().min(last);
        (lo, hi)
    }

    /// Remove material inside a sphere with a linear falloff over the outer
    /// `smooth_range` samples of its radius.
    ///
    /// Material mass is `1 - value / 255`; the fade is subtracted from it, so
    /// repeated hits erode further. Chunks within `radius + dirty_margin`
    /// samples are queued and decor inside the sphere is removed.
    pub fn damage_sphere(&mut self, world_pos: Vec3, world_radius: f32, smooth_range: f32) {
        let pos = self.world_to_data(world_pos);
        let radius = world_radius / self.voxel_length();
        let margin = self.config().dirty_margin;
        let (lo, hi) = self.sample_range(pos, Vec3::splat(radius));

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let pixel = IVec3::new(x, y, z);
                    let length = (pos - pixel.as_vec3()).length();
                    if length < radius {
                        let fade = if smooth_range > 0.0 {
                            remap(length, radius - smooth_range, radius, 1.0, 0.0).clamp(0.0, 1.0)
                        } else {
                            1.0
                        };
                        let mass = 1.0 - self.get_pixel(pixel) as f32 / 255.0;
                        let new_mass = (mass - fade).clamp(0.0, 1.0);
                        self.set_pixel(pixel, remap(new_mass, 0.0, 1.0, 255.0, 0.0) as u8);
                    }
                    if length < radius + margin {
                        self.queue_chunk(self.chunk_of_pixel(pixel));
                    }
                }
            }
        }

        self.erase_decor_sphere(world_pos, world_radius);
    }

    /// Blast a sphere to just above the surface value, brighter toward the
    /// centre, then remove decor inside it.
    pub fn destroy_sphere(&mut self, world_pos: Vec3, world_radius: f32) {
        let pos = self.world_to_data(world_pos);
        let radius = world_radius / self.voxel_length();
        let margin = self.config().dirty_margin;
        let destroy = self.config().destroy_value as f32;
        let surface = self.config().surface_value as f32;
        let (lo, hi) = self.sample_range(pos, Vec3::splat(radius));

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let pixel = IVec3::new(x, y, z);
                    let length = (pos - pixel.as_vec3()).length();
                    if length < radius {
                        let falloff = (radius - length * 0.9) / radius;
                        let value = destroy * falloff * 0.5 + surface;
                        self.set_pixel(pixel, value.min(255.0) as u8);
                    }
                    if length < radius + margin {
                        self.queue_chunk(self.chunk_of_pixel(pixel));
                    }
                }
            }
        }

        self.erase_decor_sphere(world_pos, world_radius);
    }

    /// Add air in a vertical cylinder standing on `world_pos`.
    ///
    /// Samples gain `strength` scaled by a gentle radial falloff, saturating
    /// at 255. The column spans `height` plus one sample above the base.
    pub fn damage_cylinder(&mut self, world_pos: Vec3, world_radius: f32, world_height: f32, strength: u8) {
        let pos = self.world_to_data(world_pos);
        let voxel = self.voxel_length();
        let radius = world_radius / voxel;
        let height = world_height / voxel;
        let margin = self.config().dirty_margin;

        // The y range starts one sample below the base and ends one above the top
        let centre = Vec3::new(pos.x, pos.y + height * 0.5, pos.z);
        let extent = Vec3::new(radius, height * 0.5 + 1.0, radius);
        let (lo, hi) = self.sample_range(centre, extent);

        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let pixel = IVec3::new(x, y, z);
                    let length = Vec3::new(pos.x - x as f32, 0.0, pos.z - z as f32).length();
                    let fy = y as f32;
                    if length < radius && pos.y <= fy && fy < pos.y + height + 1.0 {
                        let falloff = (radius - length * 0.4) / radius;
                        let value = self.get_pixel(pixel) as f32 + strength as f32 * falloff;
                        self.set_pixel(pixel, value.min(255.0) as u8);
                    }
                    if length < radius + margin {
                        self.queue_chunk(self.chunk_of_pixel(pixel));
                    }
                }
            }
        }
    }

    /// [`damage_cylinder`](Self::damage_cylinder) with a half-unit radius and
    /// height and strength 180.
    pub fn damage_cylinder_default(&mut self, world_pos: Vec3) {
        self.damage_cylinder(world_pos, 0.5, 0.5, 180);
    }

    /// Soften upward-facing slopes.
    ///
    /// A sample whose gradient points more than `0.6` toward +y is replaced
    /// in place by the integer mean of itself and its six neighbours, and its
    /// chunk (plus any face neighbour) is queued. Samples are visited in
    /// storage order, so later samples see earlier results.
    pub fn smooth_terrain(&mut self) {
        let [sx, sy, sz] = self.size();
        let sentinel = self.config().volume_out_of_bounds;
        let mut smoothed = 0usize;

        for z in 0..sz as i32 {
            for y in 0..sy as i32 {
                for x in 0..sx as i32 {
                    let pixel = IVec3::new(x, y, z);
                    let flow = self.field().flow(pixel.as_vec3(), 1.0, sentinel);
                    if flow.length() < MIN_FLOW {
                        continue;
                    }
                    if flow.normalize().dot(Vec3::Y) <= SMOOTH_TILT {
                        continue;
                    }

                    let sum: u32 = NEIGHBOURS
                        .iter()
                        .map(|offset| self.get_pixel(pixel + *offset) as u32)
                        .sum::<u32>()
                        + self.get_pixel(pixel) as u32;
                    self.set_pixel(pixel, (sum / 7) as u8);
                    self.queue_chunk_by_pixel(pixel);
                    smoothed += 1;
                }
            }
        }

        log::debug!("Smoothed {} samples", smoothed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::chunk::{Chunk, ChunkCoord};
    use crate::terrain::config::TerrainConfig;

    fn solid_volume() -> TerrainVolume {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        let mut volume = TerrainVolume::new([32, 32, 32], 32.0, config).unwrap();
        volume.generate_fill();
        volume
    }

    #[test]
    fn test_remap() {
        assert_eq!(remap(5.0, 0.0, 10.0, 0.0, 1.0), 0.5);
        assert_eq!(remap(0.25, 0.0, 1.0, 255.0, 0.0), 191.25);
    }

    #[test]
    fn test_damage_sphere_carves_and_fades() {
        let mut volume = solid_volume();
        volume.damage_sphere(Vec3::splat(16.0), 6.0, 2.0);
        // Centre fully carved
        assert_eq!(volume.get_pixel(IVec3::splat(16)), 255);
        // Inside the smoothing band: partially carved
        let band = volume.get_pixel(IVec3::new(21, 16, 16));
        assert!(band > 0 && band < 255, "band value {band}");
        // Outside the sphere untouched
        assert_eq!(volume.get_pixel(IVec3::new(23, 16, 16)), 0);
    }

    #[test]
    fn test_damage_sphere_erodes_cumulatively() {
        let mut volume = solid_volume();
        let edge = IVec3::new(21, 16, 16);
        volume.damage_sphere(Vec3::splat(16.0), 6.0, 2.0);
        let once = volume.get_pixel(edge);
        volume.damage_sphere(Vec3::splat(16.0), 6.0, 2.0);
        assert!(volume.get_pixel(edge) > once);
    }

    #[test]
    fn test_damage_sphere_queues_margin() {
        let mut volume = solid_volume();
        // Sphere entirely inside chunk (1, 1, 1) but within the margin of (2, 1, 1)
        volume.damage_sphere(Vec3::new(14.4, 12.0, 12.0), 1.5, 0.5);
        let dirty = volume.dirty_chunks();
        assert!(dirty.contains(&ChunkCoord::new(1, 1, 1)));
        assert!(dirty.contains(&ChunkCoord::new(2, 1, 1)));
        assert!(!dirty.contains(&ChunkCoord::new(3, 1, 1)));
    }

    #[test]
    fn test_remesh_dirty_leaves_untouched_chunks() {
        let mut volume = solid_volume();
        volume.damage_sphere(Vec3::splat(16.0), 9.0, 0.5);
        volume.remesh_all();
        let before: Vec<Vec<_>> = volume.chunks().iter().map(|c| c.vertices().to_vec()).collect();

        volume.damage_sphere(Vec3::new(5.0, 5.0, 5.0), 2.0, 0.5);
        let dirty: Vec<ChunkCoord> = volume.dirty_chunks().to_vec();
        assert!(!dirty.is_empty());
        volume.remesh_dirty();

        for (chunk, old) in volume.chunks().iter().zip(&before) {
            if !dirty.contains(&chunk.coord()) {
                assert_eq!(chunk.vertices(), old.as_slice(), "chunk {:?} changed", chunk.coord());
            }
        }
        let touched = volume.chunk(ChunkCoord::new(0, 0, 0)).map(Chunk::triangle_count).unwrap();
        assert!(touched > 0);
    }

    #[test]
    fn test_destroy_sphere_sets_air_above_surface() {
        let mut volume = solid_volume();
        volume.destroy_sphere(Vec3::splat(16.0), 4.0);
        let centre = volume.get_pixel(IVec3::splat(16));
        // destroy * 1.0 * 0.5 + surface
        assert_eq!(centre, (255.0f32 * 0.5 + 126.0).min(255.0) as u8);
        let rim = volume.get_pixel(IVec3::new(19, 16, 16));
        assert!(rim > volume.config().surface_value);
        assert!(volume.has_dirty());
    }

    #[test]
    fn test_damage_cylinder_saturates() {
        let mut volume = solid_volume();
        let base = volume.data_to_world(Vec3::new(16.0, 10.0, 16.0));
        volume.damage_cylinder(base, 3.0, 4.0, 180);
        assert_eq!(volume.get_pixel(IVec3::new(16, 12, 16)), 180);
        // Below the base untouched
        assert_eq!(volume.get_pixel(IVec3::new(16, 9, 16)), 0);
        volume.damage_cylinder(base, 3.0, 4.0, 180);
        assert_eq!(volume.get_pixel(IVec3::new(16, 12, 16)), 255);
        assert!(volume.has_dirty());
    }

    #[test]
    fn test_smooth_terrain_softens_floor() {
        let mut volume = solid_volume();
        // Flat floor: solid below y = 16, air above
        for z in 0..32 {
            for y in 16..32 {
                for x in 0..32 {
                    volume.set_pixel(IVec3::new(x, y, z), 255);
                }
            }
        }
        volume.remesh_all();
        volume.smooth_terrain();
        // The top solid layer has an upward gradient and is averaged toward air
        let top = volume.get_pixel(IVec3::new(10, 15, 10));
        assert!(top > 0);
        assert!(volume.has_dirty());
    }
}
