//! Two-tier raycasting against the terrain surface.
//!
//! The broad phase culls the chunk index and visits chunks in order of entry
//! distance; the narrow phase tests the triangles of each chunk through that
//! chunk's own index. Rays shorter than one chunk skip the broad phase and
//! test the handful of chunks spanned by the segment directly.

use serde::Serialize;

use crate::core::transform::transform_normal;
use crate::core::types::{IVec3, Vec3};
use crate::math::Ray;
use crate::spatial::SpatialIndex;
use super::chunk::ChunkCoord;
use super::volume::TerrainVolume;

/// Below this a direction or distance counts as zero
const MIN_RAY_LENGTH: f32 = 1e-5;

/// A surface hit
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    /// Unit surface normal facing the air side
    pub normal: Vec3,
    /// Distance from the ray origin to `point`
    pub distance: f32,
}

/// Counters from the last long-range raycast
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RaycastInfo {
    pub total_chunks: usize,
    /// Chunks returned by the index cull
    pub culled_chunks: usize,
    /// Culled chunks the ray enters within its distance
    pub intersected_chunks: usize,
    /// Chunks narrow-phase tested before a hit or exhaustion
    pub iterations: usize,
    /// Triangles held by the tested chunks
    pub total_triangles: usize,
    /// Triangles that survived the per-chunk cull
    pub tested_triangles: usize,
}

fn is_degenerate(direction: Vec3, distance: f32) -> bool {
    direction.length() < MIN_RAY_LENGTH || distance < MIN_RAY_LENGTH
}

impl TerrainVolume {
    /// Raycast in world space, choosing short or long range by distance.
    pub fn raycast(&self, origin: Vec3, direction: Vec3, distance: f32) -> Option<RayHit> {
        self.world_raycast(origin, direction, distance, |volume, o, d, dist| {
            volume.raycast_local(o, d, dist)
        })
    }

    /// World-space long-range raycast that also reports its counters.
    pub fn raycast_with_info(&self, origin: Vec3, direction: Vec3, distance: f32, info: &mut RaycastInfo) -> Option<RayHit> {
        self.world_raycast(origin, direction, distance, |volume, o, d, dist| {
            volume.long_raycast_local(o, d, dist, info)
        })
    }

    /// World-space short-range raycast.
    pub fn short_raycast(&self, origin: Vec3, direction: Vec3, distance: f32) -> Option<RayHit> {
        self.world_raycast(origin, direction, distance, |volume, o, d, dist| {
            volume.short_raycast_local(o, d, dist)
        })
    }

    /// Carry a world ray into local space, run `cast`, and carry the hit back.
    fn world_raycast<F>(&self, origin: Vec3, direction: Vec3, distance: f32, cast: F) -> Option<RayHit>
    where
        F: FnOnce(&Self, Vec3, Vec3, f32) -> Option<RayHit>,
    {
        if is_degenerate(direction, distance) {
            return None;
        }
        let world_ray = Ray::new(origin, direction.normalize());
        let (local_ray, local_distance) =
            world_ray.transform_segment(&self.transform().inverse_matrix(), distance);

        let hit = cast(self, local_ray.origin, local_ray.direction, local_distance)?;
        let point = self.local_to_world(hit.point);
        Some(RayHit {
            point,
            normal: transform_normal(&self.transform().normal_matrix(), hit.normal),
            distance: (point - origin).length(),
        })
    }

    /// Local-space raycast: short range when the segment fits in one chunk
    /// step, long range otherwise.
    pub fn raycast_local(&self, origin: Vec3, direction: Vec3, distance: f32) -> Option<RayHit> {
        if is_degenerate(direction, distance) {
            return None;
        }
        if distance <= self.config().grid_step() {
            self.short_raycast_local(origin, direction, distance)
        } else {
            self.long_raycast_local(origin, direction, distance, &mut RaycastInfo::default())
        }
    }

    /// Broad phase over the chunk index, nearest chunk first. The first chunk
    /// with a hit wins.
    pub fn long_raycast_local(&self, origin: Vec3, direction: Vec3, distance: f32, info: &mut RaycastInfo) -> Option<RayHit> {
        if is_degenerate(direction, distance) {
            return None;
        }
        let ray = Ray::new(origin, direction.normalize());
        let n = self.config().grid_size;

        let culled = self.chunk_index().cull_by_ray(&ray, distance);
        info.total_chunks = n * n * n;
        info.culled_chunks = culled.len();

        let mut intersected: Vec<(f32, usize)> = culled
            .into_iter()
            .filter(|(entry, _)| *entry <= distance)
            .map(|(entry, &index)| (entry, index))
            .collect();
        intersected.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        info.intersected_chunks = intersected.len();

        let mut tests = 0;
        let mut iterations = 0;
        let mut total_triangles = 0;
        let mut result = None;
        for (_, index) in intersected {
            let chunk = &self.chunks()[index];
            iterations += 1;
            total_triangles += chunk.triangle_count();
            if let Some(hit) = chunk.raycast(&ray, distance, &mut tests) {
                result = Some(hit);
                break;
            }
        }
        info.iterations = iterations;
        info.total_triangles = total_triangles;
        info.tested_triangles = tests;
        result
    }

    /// Test every chunk in the coordinate box spanned by the segment and keep
    /// the closest hit.
    pub fn short_raycast_local(&self, origin: Vec3, direction: Vec3, distance: f32) -> Option<RayHit> {
        if is_degenerate(direction, distance) {
            return None;
        }
        let ray = Ray::new(origin, direction.normalize());
        let n = self.config().grid_size as i32;
        let to_chunk = |p: Vec3| (p * n as f32).floor().as_ivec3();
        let a = to_chunk(ray.origin);
        let b = to_chunk(ray.at(distance));
        let max = IVec3::splat(n - 1);
        let lo = a.min(b).clamp(IVec3::ZERO, max);
        let hi = a.max(b).clamp(IVec3::ZERO, max);

        let mut tests = 0;
        let mut closest: Option<RayHit> = None;
        for z in lo.z..=hi.z {
            for y in lo.y..=hi.y {
                for x in lo.x..=hi.x {
                    let Some(chunk) = self.chunk(ChunkCoord::new(x, y, z)) else {
                        continue;
                    };
                    if let Some(hit) = chunk.raycast(&ray, distance, &mut tests) {
                        if closest.is_none_or(|best| hit.distance < best.distance) {
                            closest = Some(hit);
                        }
                    }
                }
            }
        }
        closest
    }

    /// Wall thickness between two points, measured by casting from each point
    /// toward the other. `None` unless both casts hit.
    pub fn measure_wall_thickness(&self, point1: Vec3, point2: Vec3) -> Option<f32> {
        let span = point2 - point1;
        let distance = span.length();
        let first = self.raycast(point1, span, distance)?;
        let second = self.raycast(point2, -span, distance)?;
        Some((second.point - first.point).length())
    }
}
