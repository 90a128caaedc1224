//! Point queries against the density field.

use crate::core::types::{IVec3, Vec3};
use super::volume::TerrainVolume;

impl TerrainVolume {
    /// Raw sample under a world position
    pub fn terrain_value(&self, world_pos: Vec3) -> u8 {
        let data = self.world_to_data(world_pos);
        self.get_pixel(data.floor().as_ivec3())
    }

    /// Whether a world position lies inside material
    pub fn is_in_ground(&self, world_pos: Vec3) -> bool {
        self.terrain_value(world_pos) < self.config().surface_value
    }

    /// An air sample with at least one solid sample among its 26 in-field
    /// neighbours.
    pub fn is_on_edge(&self, pixel: IVec3) -> bool {
        let surface = self.config().surface_value;
        if self.get_pixel(pixel) <= surface {
            return false;
        }
        let field = self.field();
        for z in -1..=1 {
            for y in -1..=1 {
                for x in -1..=1 {
                    let offset = IVec3::new(x, y, z);
                    if offset == IVec3::ZERO {
                        continue;
                    }
                    if field.get(pixel + offset).is_some_and(|v| v < surface) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn is_on_edge_world(&self, world_pos: Vec3) -> bool {
        self.is_on_edge(self.world_to_data(world_pos).floor().as_ivec3())
    }

    /// Central-difference gradient of the field at a world position, each
    /// axis scaled to [-1, 1]. Points toward air.
    ///
    /// `step` is the difference step in samples.
    pub fn data_field_flow(&self, world_pos: Vec3, step: f32) -> Vec3 {
        let data = self.world_to_data(world_pos);
        self.field().flow(data, step, self.config().volume_out_of_bounds)
    }

    /// [`data_field_flow`](Self::data_field_flow) at a sample position.
    pub fn data_field_flow_at(&self, pixel: IVec3, step: f32) -> Vec3 {
        self.field().flow(pixel.as_vec3(), step, self.config().volume_out_of_bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::config::TerrainConfig;

    /// 16^3 volume, solid below y = 8, one world unit per sample
    fn floor_volume() -> TerrainVolume {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        let mut volume = TerrainVolume::new([16, 16, 16], 16.0, config).unwrap();
        for z in 0..16 {
            for y in 0..8 {
                for x in 0..16 {
                    volume.set_pixel(IVec3::new(x, y, z), 0);
                }
            }
        }
        volume
    }

    #[test]
    fn test_terrain_value_and_in_ground() {
        let volume = floor_volume();
        assert_eq!(volume.terrain_value(Vec3::new(3.5, 2.2, 9.9)), 0);
        assert!(volume.is_in_ground(Vec3::new(3.5, 7.9, 9.9)));
        assert!(!volume.is_in_ground(Vec3::new(3.5, 8.1, 9.9)));
        // Outside the field reads the volume sentinel, which counts as ground
        assert_eq!(volume.terrain_value(Vec3::new(-3.0, 12.0, 0.0)), 100);
        assert!(volume.is_in_ground(Vec3::new(-3.0, 12.0, 0.0)));
    }

    #[test]
    fn test_is_on_edge() {
        let volume = floor_volume();
        // First air layer touches the floor
        assert!(volume.is_on_edge(IVec3::new(5, 8, 5)));
        // Solid samples are never edges
        assert!(!volume.is_on_edge(IVec3::new(5, 7, 5)));
        // Two layers up is clear of the floor
        assert!(!volume.is_on_edge(IVec3::new(5, 9, 5)));
        assert!(volume.is_on_edge_world(Vec3::new(5.5, 8.5, 5.5)));
    }

    #[test]
    fn test_is_on_edge_ignores_out_of_field_neighbours() {
        let volume = floor_volume();
        // Sentinel 100 outside the field would count as solid if read
        assert!(!volume.is_on_edge(IVec3::new(0, 12, 0)));
        assert!(!volume.is_on_edge(IVec3::new(15, 15, 15)));
    }

    #[test]
    fn test_flow_points_to_air() {
        let volume = floor_volume();
        let flow = volume.data_field_flow_at(IVec3::new(8, 8, 8), 1.0);
        assert!(flow.y > 0.9);
        assert_eq!(flow.x, 0.0);
        assert_eq!(flow.z, 0.0);

        let world = volume.data_field_flow(Vec3::new(8.0, 8.0, 8.0), 1.0);
        assert_eq!(world, flow);
    }
}
