//! Surface decor and terrain colouring.
//!
//! Decor are small instanced props scattered over upward-facing surfaces.
//! Their colour is taken from the same height-banded palette the terrain
//! shader uses, so they blend into the ground they sit on.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::transform::Transform;
use crate::core::types::{IVec3, Quat, Vec3};
use super::volume::TerrainVolume;

/// Number of decor meshes scattered by [`TerrainVolume::place_decor`]
pub const DECOR_KINDS: usize = 5;

/// Chance that an edge sample attempts to place decor
const DECOR_CHANCE: f32 = 0.2;
/// Hits flatter than this against up are rejected
const DECOR_MIN_UP: f32 = 0.6;
/// Fraction of the way to a bonus colour for the tinted bands
const BONUS_TINT: f32 = 0.75;

/// One placed prop
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecorInstance {
    pub transform: Transform,
    pub color: Vec3,
}

/// All instances of one decor mesh
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecorCollection {
    pub name: String,
    pub instances: Vec<DecorInstance>,
}

impl DecorCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
        }
    }
}

fn rgb(r: u8, g: u8, b: u8) -> Vec3 {
    Vec3::new(r as f32, g as f32, b as f32) / 255.0
}

/// Height-banded floor, wall and ceiling colours.
///
/// Band 0 is the top quarter of the volume; bands 1 to 3 tint the base
/// colours toward the bonus colours going down.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainPalette {
    pub floor: [Vec3; 4],
    pub wall: [Vec3; 4],
    pub ceiling: [Vec3; 4],
    /// Normal-up dot above which a surface is pure floor
    pub floor_limit: f32,
    /// Normal-up dot below which a surface is pure ceiling
    pub ceiling_limit: f32,
}

impl Default for TerrainPalette {
    fn default() -> Self {
        let bonus = [rgb(251, 185, 84), rgb(190, 173, 224), rgb(240, 79, 120)];
        let bands = |base: Vec3| {
            let mut out = [base; 4];
            for (i, tint) in bonus.iter().enumerate() {
                out[i + 1] = base * Vec3::ONE.lerp(*tint, BONUS_TINT);
            }
            out
        };
        Self {
            floor: bands(rgb(171, 148, 122)),
            wall: bands(rgb(150, 108, 100)),
            ceiling: bands(rgb(98, 85, 101)),
            floor_limit: 0.663,
            ceiling_limit: 0.461,
        }
    }
}

impl TerrainPalette {
    /// Colour of a surface at a volume-local position with the given normal.
    ///
    /// Between the limits the colour blends ceiling to wall to floor with a
    /// quadratic ease on each half.
    pub fn color_at(&self, local_pos: Vec3, normal: Vec3) -> Vec3 {
        let band = (3 - (local_pos.y * 4.0).floor() as i32).clamp(0, 3) as usize;
        let up = normal.dot(Vec3::Y);
        if up > self.floor_limit {
            return self.floor[band];
        }
        if up <= self.ceiling_limit {
            return self.ceiling[band];
        }

        let ease = |x: f32| (x * x).clamp(0.0, 1.0);
        let t = (up - self.ceiling_limit) / (self.floor_limit - self.ceiling_limit);
        if t < 0.5 {
            self.ceiling[band].lerp(self.wall[band], ease(t * 2.0))
        } else {
            self.wall[band].lerp(self.floor[band], ease(t * 2.0 - 1.0))
        }
    }

    /// Fog colour for a camera at `camera_height` in a volume `volume_height`
    /// tall. Fades into the next band over the last fifth of each band.
    pub fn fog_color(&self, camera_height: f32, volume_height: f32) -> Vec3 {
        let portion = (camera_height / volume_height * 4.0).clamp(0.0, 3.99);
        let band = 3 - portion as usize;
        let rest = 1.0 - portion.fract();
        if rest < 0.8 || band == 3 {
            self.ceiling[band]
        } else {
            let t = (rest - 0.8) / 0.2;
            self.ceiling[band].lerp(self.ceiling[band + 1], t)
        }
    }
}

/// Random unit vector, or `None` for a near-zero draw
fn random_direction<R: Rng + ?Sized>(rng: &mut R) -> Option<Vec3> {
    let v = Vec3::new(
        rng.random_range(-1.0..=1.0),
        rng.random_range(-1.0..=1.0),
        rng.random_range(-1.0..=1.0),
    );
    v.try_normalize()
}

impl TerrainVolume {
    pub fn palette(&self) -> &TerrainPalette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: TerrainPalette) {
        self.palette = palette;
    }

    /// Palette colour at a volume-local position
    pub fn terrain_color(&self, local_pos: Vec3, normal: Vec3) -> Vec3 {
        self.palette.color_at(local_pos, normal)
    }

    /// Fog colour for a camera at the given world height
    pub fn fog_color(&self, camera_world_y: f32) -> Vec3 {
        self.palette.fog_color(camera_world_y, self.transform().scale.y)
    }

    pub fn decor(&self) -> &[DecorCollection] {
        &self.decor
    }

    pub fn decor_count(&self) -> usize {
        self.decor.iter().map(|c| c.instances.len()).sum()
    }

    /// Replace all decor with a fresh scatter over the current surface.
    ///
    /// Each edge sample has a one in five chance to cast a ray in a random
    /// direction; an upward-facing hit receives a randomly rotated and scaled
    /// prop. Chunks must be meshed. Returns the number of props placed.
    pub fn place_decor<R: Rng + ?Sized>(&mut self, rng: &mut R) -> usize {
        let mut decor: Vec<DecorCollection> = (1..=DECOR_KINDS)
            .map(|i| DecorCollection::new(format!("particle_{i}")))
            .collect();
        let size = self.field().size_f32();
        let [sx, sy, sz] = self.size();
        let mut placed = 0;

        for z in 0..sz as i32 {
            for y in 0..sy as i32 {
                for x in 0..sx as i32 {
                    let pixel = IVec3::new(x, y, z);
                    if !self.is_on_edge(pixel) || rng.random::<f32>() > DECOR_CHANCE {
                        continue;
                    }
                    let Some(direction) = random_direction(rng) else {
                        continue;
                    };
                    let origin = pixel.as_vec3() / size;
                    let Some(hit) = self.raycast_local(origin, direction, 1.0) else {
                        continue;
                    };
                    if hit.normal.dot(Vec3::Y) < DECOR_MIN_UP {
                        continue;
                    }

                    let kind = rng.random_range(0..DECOR_KINDS);
                    let axis = random_direction(rng).unwrap_or(Vec3::Y);
                    let angle = rng.random_range(0.0..std::f32::consts::TAU);
                    let transform = Transform::new(
                        self.local_to_world(hit.point),
                        Quat::from_axis_angle(axis, angle),
                        Vec3::splat(rng.random_range(1.0..4.0)),
                    );
                    decor[kind].instances.push(DecorInstance {
                        transform,
                        color: self.palette.color_at(hit.point, hit.normal),
                    });
                    placed += 1;
                }
            }
        }

        self.decor = decor;
        log::info!("Placed {} decor instances", placed);
        placed
    }

    /// Remove every prop whose origin lies within `radius` of `world_pos`.
    pub fn erase_decor_sphere(&mut self, world_pos: Vec3, radius: f32) {
        let radius_sq = radius * radius;
        for collection in &mut self.decor {
            collection
                .instances
                .retain(|instance| instance.transform.position.distance_squared(world_pos) >= radius_sq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;
    use crate::terrain::config::TerrainConfig;

    #[test]
    fn test_palette_bands() {
        let palette = TerrainPalette::default();
        assert_eq!(palette.floor[0], rgb(171, 148, 122));
        // Tinted bands are darker or equal per channel
        for band in 1..4 {
            let tinted = palette.ceiling[band];
            assert!(tinted.cmple(palette.ceiling[0] + Vec3::splat(1e-6)).all());
        }
    }

    #[test]
    fn test_color_at_by_slope() {
        let palette = TerrainPalette::default();
        let top = Vec3::new(0.5, 0.9, 0.5);
        assert_eq!(palette.color_at(top, Vec3::Y), palette.floor[0]);
        assert_eq!(palette.color_at(top, Vec3::NEG_Y), palette.ceiling[0]);
        // Exactly halfway between the limits is pure wall
        let mid = (palette.floor_limit + palette.ceiling_limit) * 0.5;
        let normal = Vec3::new((1.0 - mid * mid).sqrt(), mid, 0.0);
        let wall = palette.color_at(top, normal);
        assert!((wall - palette.wall[0]).length() < 1e-3);
    }

    #[test]
    fn test_color_at_by_height() {
        let palette = TerrainPalette::default();
        assert_eq!(palette.color_at(Vec3::new(0.0, 0.1, 0.0), Vec3::Y), palette.floor[3]);
        assert_eq!(palette.color_at(Vec3::new(0.0, 0.3, 0.0), Vec3::Y), palette.floor[2]);
        // Out of range heights clamp to the end bands
        assert_eq!(palette.color_at(Vec3::new(0.0, -1.0, 0.0), Vec3::Y), palette.floor[3]);
        assert_eq!(palette.color_at(Vec3::new(0.0, 2.0, 0.0), Vec3::Y), palette.floor[0]);
    }

    #[test]
    fn test_fog_color() {
        let palette = TerrainPalette::default();
        // Middle of the top band
        assert_eq!(palette.fog_color(87.5, 100.0), palette.ceiling[0]);
        // Bottom of the volume
        assert_eq!(palette.fog_color(0.0, 100.0), palette.ceiling[3]);
        // Just above a band boundary: blending toward the band below
        let fog = palette.fog_color(50.5, 100.0);
        assert_ne!(fog, palette.ceiling[1]);
        assert_ne!(fog, palette.ceiling[2]);
    }

    fn floor_volume() -> TerrainVolume {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        let mut volume = TerrainVolume::new([16, 16, 16], 16.0, config).unwrap();
        for z in 0..16 {
            for y in 0..6 {
                for x in 0..16 {
                    volume.set_pixel(IVec3::new(x, y, z), 0);
                }
            }
        }
        volume.remesh_all();
        volume
    }

    #[test]
    fn test_place_decor_on_floor() {
        let mut volume = floor_volume();
        let mut rng = Pcg64Mcg::seed_from_u64(7);
        let placed = volume.place_decor(&mut rng);
        assert!(placed > 0);
        assert_eq!(volume.decor_count(), placed);
        assert_eq!(volume.decor().len(), DECOR_KINDS);
        for instance in volume.decor().iter().flat_map(|c| &c.instances) {
            // Props sit on the floor surface near y = 5.5
            let y = instance.transform.position.y;
            assert!((4.9..6.0).contains(&y), "prop at y {y}");
            assert!(instance.transform.scale.x >= 1.0 && instance.transform.scale.x < 4.0);
        }
    }

    #[test]
    fn test_place_decor_is_deterministic() {
        let mut a = floor_volume();
        let mut b = floor_volume();
        a.place_decor(&mut Pcg64Mcg::seed_from_u64(3));
        b.place_decor(&mut Pcg64Mcg::seed_from_u64(3));
        assert_eq!(a.decor(), b.decor());
    }

    #[test]
    fn test_erase_decor_sphere() {
        let mut volume = floor_volume();
        volume.place_decor(&mut Pcg64Mcg::seed_from_u64(11));
        let before = volume.decor_count();
        assert!(before > 0);

        volume.erase_decor_sphere(Vec3::new(8.0, 5.5, 8.0), 6.0);
        let after = volume.decor_count();
        assert!(after < before);
        let survivors_far = volume
            .decor()
            .iter()
            .flat_map(|c| &c.instances)
            .all(|i| i.transform.position.distance(Vec3::new(8.0, 5.5, 8.0)) >= 6.0);
        assert!(survivors_far);

        // Edits clear decor as well
        volume.destroy_sphere(Vec3::new(8.0, 5.5, 8.0), 100.0);
        assert_eq!(volume.decor_count(), 0);
    }
}
