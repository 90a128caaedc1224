//! Physics engine seam.
//!
//! Chunks hand their triangle soup to a [`PhysicsBackend`] after every remesh
//! and receive an opaque handle back. Colliders start asleep; the volume wakes
//! the chunks around points of interest each frame.

use crate::core::transform::Transform;
use crate::core::types::{IVec3, Vec3};
use super::chunk::ChunkCoord;
use super::volume::TerrainVolume;

/// Opaque collider id issued by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColliderHandle(pub u64);

/// Collision-actor creation and simulation toggling.
pub trait PhysicsBackend {
    /// Build a static triangle-mesh collider. `positions` holds three entries
    /// per triangle in the space described by `placement`.
    fn create_triangle_mesh(&mut self, positions: &[Vec3], placement: &Transform) -> Option<ColliderHandle>;

    fn release_collider(&mut self, handle: ColliderHandle);

    fn set_simulation_enabled(&mut self, handle: ColliderHandle, enabled: bool);
}

impl TerrainVolume {
    /// Remesh every chunk, then rebuild colliders for all of them.
    pub fn remesh_all_with_physics(&mut self, physics: &mut dyn PhysicsBackend) {
        self.remesh_all();
        let transform = *self.transform();
        for chunk in self.chunks_mut() {
            chunk.regenerate_collider(physics, &transform);
        }
    }

    /// Remesh queued chunks, then rebuild their colliders.
    ///
    /// Returns the number of chunks remeshed.
    pub fn remesh_dirty_with_physics(&mut self, physics: &mut dyn PhysicsBackend) -> usize {
        let remeshed = self.dirty_chunks().to_vec();
        let count = self.remesh_dirty();
        let transform = *self.transform();
        for coord in remeshed {
            if let Some(chunk) = self.chunk_mut(coord) {
                chunk.regenerate_collider(physics, &transform);
            }
        }
        count
    }

    /// Toggle simulation on one chunk's collider.
    pub fn set_chunk_physics_active(&mut self, physics: &mut dyn PhysicsBackend, coord: ChunkCoord, active: bool) {
        if let Some(chunk) = self.chunk_mut(coord) {
            chunk.set_physics_active(physics, active);
        }
    }

    /// Chunks that should simulate for the given world-space points.
    ///
    /// Each point wakes its own chunk, plus the face, edge and corner
    /// neighbours it lies within `wake_distance` (world units) of.
    pub fn chunks_near(&self, points: &[Vec3], wake_distance: f32) -> Vec<ChunkCoord> {
        let grid = self.config().grid_size as i32;
        let chunk_world = self.transform().scale / grid as f32;
        // Distance from a chunk centre, in chunk units, past which a neighbour wakes
        let border = Vec3::splat(0.5) - Vec3::splat(wake_distance) / chunk_world;

        let in_grid = |id: IVec3| id.min_element() >= 0 && id.max_element() < grid;
        let mut awake = Vec::new();
        for &point in points {
            let pos = self.world_to_local(point) * grid as f32;
            let id = pos.floor().as_ivec3();
            if !in_grid(id) {
                continue;
            }
            awake.push(id);

            let centred = pos - pos.floor() - Vec3::splat(0.5);
            let mut sides = [IVec3::ZERO; 3];
            for axis in 0..3 {
                if centred[axis].abs() > border[axis] {
                    let mut side = IVec3::ZERO;
                    side[axis] = if centred[axis] < 0.0 { -1 } else { 1 };
                    if in_grid(id + side) {
                        sides[axis] = side;
                    }
                }
            }
            // Every combination of the chosen sides: faces, edges and the corner
            for mask in 1..8usize {
                let offset: IVec3 = (0..3)
                    .filter(|axis| mask & (1 << axis) != 0)
                    .map(|axis| sides[axis])
                    .sum();
                let chosen = (0..3).filter(|axis| mask & (1 << axis) != 0).all(|axis| sides[axis] != IVec3::ZERO);
                if chosen && in_grid(id + offset) {
                    awake.push(id + offset);
                }
            }
        }
        awake.into_iter().map(ChunkCoord::from).collect()
    }

    /// Wake chunks near `points` and put every previously awake chunk that is
    /// no longer near a point back to sleep.
    pub fn update_physics_active(&mut self, physics: &mut dyn PhysicsBackend, points: &[Vec3], wake_distance: f32) {
        let awake = self.chunks_near(points, wake_distance);
        for &coord in &awake {
            self.set_chunk_physics_active(physics, coord, true);
        }
        let previous = std::mem::replace(self.physics_awake_mut(), awake);
        for coord in previous {
            if !self.physics_awake().contains(&coord) {
                self.set_chunk_physics_active(physics, coord, false);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::terrain::config::TerrainConfig;

    /// Backend that records collider state
    #[derive(Default)]
    struct RecordingPhysics {
        next: u64,
        colliders: HashMap<ColliderHandle, (usize, bool)>,
        released: usize,
        toggles: usize,
    }

    impl PhysicsBackend for RecordingPhysics {
        fn create_triangle_mesh(&mut self, positions: &[Vec3], _placement: &Transform) -> Option<ColliderHandle> {
            self.next += 1;
            let handle = ColliderHandle(self.next);
            self.colliders.insert(handle, (positions.len(), true));
            Some(handle)
        }

        fn release_collider(&mut self, handle: ColliderHandle) {
            self.colliders.remove(&handle);
            self.released += 1;
        }

        fn set_simulation_enabled(&mut self, handle: ColliderHandle, enabled: bool) {
            if let Some(entry) = self.colliders.get_mut(&handle) {
                entry.1 = enabled;
                self.toggles += 1;
            }
        }
    }

    fn floor_volume() -> TerrainVolume {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        let mut volume = TerrainVolume::new([16, 16, 16], 16.0, config).unwrap();
        volume.generate_fill();
        volume.damage_sphere(Vec3::new(8.0, 12.0, 8.0), 6.0, 0.5);
        volume
    }

    #[test]
    fn test_colliders_follow_remesh() {
        let mut volume = floor_volume();
        let mut physics = RecordingPhysics::default();
        volume.remesh_all_with_physics(&mut physics);

        let non_empty = volume.chunks().iter().filter(|c| !c.is_empty()).count();
        assert_eq!(physics.colliders.len(), non_empty);
        assert!(physics.colliders.values().all(|(_, enabled)| !enabled));

        // Regenerating releases the old colliders first
        volume.remesh_all_with_physics(&mut physics);
        assert_eq!(physics.colliders.len(), non_empty);
        assert_eq!(physics.released, non_empty);
    }

    #[test]
    fn test_set_physics_active_only_on_change() {
        let mut volume = floor_volume();
        let mut physics = RecordingPhysics::default();
        volume.remesh_all_with_physics(&mut physics);
        let coord = volume.chunks().iter().find(|c| !c.is_empty()).unwrap().coord();
        let toggles = physics.toggles;

        volume.set_chunk_physics_active(&mut physics, coord, true);
        volume.set_chunk_physics_active(&mut physics, coord, true);
        assert_eq!(physics.toggles, toggles + 1);
        assert!(volume.chunk(coord).unwrap().is_physics_active());
    }

    #[test]
    fn test_chunks_near_centre_and_corner() {
        let volume = floor_volume();
        // Centre of chunk (1, 1, 1): 4 world units per chunk
        let centre = volume.chunks_near(&[Vec3::splat(6.0)], 0.5);
        assert_eq!(centre, vec![ChunkCoord::new(1, 1, 1)]);

        // Near the (+x, +y, +z) corner of chunk (1, 1, 1)
        let mut corner = volume.chunks_near(&[Vec3::splat(7.9)], 0.5);
        corner.sort_by_key(|c| (c.x, c.y, c.z));
        assert_eq!(corner.len(), 8);

        // Outside the volume
        assert!(volume.chunks_near(&[Vec3::splat(-1.0)], 0.5).is_empty());
    }

    #[test]
    fn test_update_physics_active_sleeps_previous() {
        let mut volume = floor_volume();
        let mut physics = RecordingPhysics::default();
        volume.remesh_all_with_physics(&mut physics);

        // Just below the carved sphere's floor
        let first = Vec3::new(8.0, 7.0, 8.0);
        volume.update_physics_active(&mut physics, &[first], 0.5);
        let awake: Vec<ChunkCoord> = volume.physics_awake().to_vec();
        assert!(awake.contains(&ChunkCoord::new(2, 1, 2)));
        assert!(volume.chunk(ChunkCoord::new(2, 1, 2)).unwrap().is_physics_active());

        volume.update_physics_active(&mut physics, &[], 0.5);
        assert!(volume.physics_awake().is_empty());
        for coord in awake {
            assert!(!volume.chunk(coord).unwrap().is_physics_active());
        }
    }
}
