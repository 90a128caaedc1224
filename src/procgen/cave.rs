//! Field generators and the full cave pipeline.

use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

use crate::core::types::{IVec3, Vec3};
use crate::terrain::TerrainVolume;
use super::carver::{CaveCarver, StructurePoint};
use super::lsystem::LSystem;

/// Spawn positions as fractions of the volume extent, in player order
pub const SPAWN_TABLE: [Vec3; 8] = [
    Vec3::new(0.5, 0.8, 0.8),
    Vec3::new(0.5, 0.8, 0.2),
    Vec3::new(0.2, 0.8, 0.5),
    Vec3::new(0.8, 0.8, 0.5),
    Vec3::new(0.2, 0.7, 0.8),
    Vec3::new(0.8, 0.7, 0.2),
    Vec3::new(0.2, 0.7, 0.2),
    Vec3::new(0.8, 0.7, 0.8),
];

/// Number of random holes punched by [`TerrainVolume::generate_cheese`]
const CHEESE_HOLES: usize = 70;

/// Tunables for turtle walks and cave generation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveParams {
    /// Initial step length, also the carve radius
    pub turtle_speed: f32,
    /// Initial turn angle in radians
    pub turtle_angle: f32,
    pub angle_increment: f32,
    pub speed_increment: f32,
    /// Minimum distance from carve points to the volume faces
    pub wall_margin: f32,
    /// Falloff band of each carve sphere, in samples
    pub carve_smoothing: f32,
    /// Caves of the smallest size class
    pub base_caves: usize,
    /// Grammar depth of the smallest size class; each larger class adds one
    pub base_iterations: usize,
    /// Extra caves added per larger size class once the volume is big enough
    pub extra_caves: usize,
    /// World extents above which the medium and large classes are added
    pub size_class_scales: [f32; 2],
    /// Grammar depth of each spawn walk
    pub spawn_iterations: usize,
    pub smoothing_passes: usize,
}

impl Default for CaveParams {
    fn default() -> Self {
        Self {
            turtle_speed: 0.8,
            turtle_angle: 0.5,
            angle_increment: 3.14 * 0.1,
            speed_increment: 0.1,
            wall_margin: 1.8,
            carve_smoothing: 0.5,
            base_caves: 10,
            base_iterations: 3,
            extra_caves: 2,
            size_class_scales: [21.0, 41.0],
            spawn_iterations: 2,
            smoothing_passes: 4,
        }
    }
}

impl CaveParams {
    /// Number of caves in each of the three size classes for a volume whose
    /// x extent is `scale_x`
    pub fn cave_counts(&self, scale_x: f32) -> [usize; 3] {
        let mut counts = [self.base_caves, 0, 0];
        for (class, threshold) in self.size_class_scales.iter().enumerate() {
            if scale_x > *threshold {
                counts[class + 1] += self.extra_caves;
            }
        }
        counts
    }
}

fn random_heading<R: Rng + ?Sized>(rng: &mut R) -> Vec3 {
    Vec3::new(
        rng.random_range(-1.0..1.0),
        rng.random_range(-0.1..0.1),
        rng.random_range(-1.0..1.0),
    )
}

impl TerrainVolume {
    /// Set every sample to solid.
    pub fn generate_fill(&mut self) {
        self.field_mut().fill(0);
    }

    /// A solid ball of radius 4 centred in a 10 unit box spanning the field.
    ///
    /// Density ramps by 64 per box unit through the surface value so the
    /// shell lands between samples.
    pub fn generate_sphere(&mut self) {
        const BOUND: f32 = 10.0;
        const RADIUS: f32 = 4.0;
        const RAMP: f32 = 64.0;
        let [sx, sy, sz] = self.size();
        let last = Vec3::new(sx as f32 - 1.0, sy as f32 - 1.0, sz as f32 - 1.0).max(Vec3::ONE);
        let surface = self.config().surface_value as f32;

        for z in 0..sz as i32 {
            for y in 0..sy as i32 {
                for x in 0..sx as i32 {
                    let pixel = IVec3::new(x, y, z);
                    let pos = (pixel.as_vec3() / last - Vec3::splat(0.5)) * BOUND;
                    let value = surface + (pos.length() - RADIUS) * RAMP;
                    self.set_pixel(pixel, value.clamp(0.0, 255.0) as u8);
                }
            }
        }
    }

    /// A wedge of material fanned around the xz diagonal, open at the bottom
    /// layer and above 60% height, riddled with random blast holes.
    pub fn generate_cheese<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let [sx, sy, sz] = self.size();
        let destroy = self.config().destroy_value;
        let radius = (sx + sz) as f32 * 0.5;
        let min_cos = 3.0 / 3.5;
        let diagonal = Vec3::new(1.0, 0.0, 1.0).normalize();

        for z in 0..sz as i32 {
            for y in 0..sy as i32 {
                for x in 0..sx as i32 {
                    let flat = Vec3::new(x as f32, 0.0, z as f32);
                    let in_wedge = flat.length() < radius
                        && flat.try_normalize().is_some_and(|n| n.dot(diagonal) > min_cos);
                    let in_slab = y > 0 && (y as f32) <= sy as f32 * 0.6;
                    let value = if in_wedge && in_slab { 0 } else { destroy };
                    self.set_pixel(IVec3::new(x, y, z), value);
                }
            }
        }

        let scale_x = self.transform().scale.x;
        for _ in 0..CHEESE_HOLES {
            let local = Vec3::new(rng.random(), rng.random(), rng.random());
            let radius = rng.random_range(scale_x * 0.01..scale_x * 0.07);
            self.destroy_sphere(self.local_to_world(local), radius);
        }
    }

    /// [`generate_cave_with`](Self::generate_cave_with) using default
    /// parameters.
    pub fn generate_cave(&mut self, players: usize, seed: u32) {
        self.generate_cave_with(players, seed, &CaveParams::default());
    }

    /// Fill the volume and carve a seeded cave network with spawn tunnels.
    ///
    /// Caves of three size classes are grown from the `K` axiom and carved,
    /// then one short walk per player starting at its [`SPAWN_TABLE`] entry.
    /// After smoothing, each spawn snaps to the nearest point of the spawn
    /// walks. Players beyond the table are dropped. Chunks are only queued;
    /// call [`remesh_all`](Self::remesh_all) afterwards.
    pub fn generate_cave_with(&mut self, players: usize, seed: u32, params: &CaveParams) {
        let start = Instant::now();
        if players > SPAWN_TABLE.len() {
            log::warn!("{} players requested, only {} spawns available", players, SPAWN_TABLE.len());
        }
        let players = players.min(SPAWN_TABLE.len());

        let mut rng = Pcg64Mcg::seed_from_u64(seed as u64);
        let grammar = LSystem::with_basic_rules();
        let mut carver = CaveCarver::new(params.clone());
        let extent = self.transform().scale;

        self.generate_fill();
        self.seed = seed;

        let counts = params.cave_counts(extent.x);
        for (class, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                let sentence = grammar.run_sentence("K", params.base_iterations + class, &mut rng);
                let unit = Vec3::new(rng.random(), rng.random_range(0.0..0.4), rng.random());
                let heading = random_heading(&mut rng);
                carver.create_structure_points(&sentence, unit * extent, heading);
            }
        }
        carver.adjust_points_to_terrain(extent);
        let mut structure: Vec<StructurePoint> = carver.structure_points().to_vec();
        let cave_points = carver.carve(self);

        let mut spawns: Vec<Vec3> = SPAWN_TABLE[..players].iter().map(|s| *s * extent).collect();
        for spawn in &spawns {
            let heading = random_heading(&mut rng);
            let sentence = grammar.run_sentence("K", params.spawn_iterations, &mut rng);
            carver.create_structure_points(&sentence, *spawn, heading);
        }
        carver.adjust_points_to_terrain(extent);
        let spawn_walks: Vec<StructurePoint> = carver.structure_points().to_vec();
        structure.extend_from_slice(&spawn_walks);
        carver.carve(self);

        for _ in 0..params.smoothing_passes {
            self.smooth_terrain();
        }

        for spawn in &mut spawns {
            let nearest = spawn_walks
                .iter()
                .min_by(|a, b| a.pos.distance_squared(*spawn).total_cmp(&b.pos.distance_squared(*spawn)));
            if let Some(point) = nearest {
                *spawn = point.pos;
            }
        }

        log::info!(
            "Generated cave (seed {}): {} caves {:?}, {} carve points, {} spawn points in {:.1}ms",
            seed,
            counts.iter().sum::<usize>(),
            counts,
            cave_points + spawn_walks.len(),
            spawns.len(),
            start.elapsed().as_secs_f64() * 1000.0,
        );

        self.structure_points = structure;
        self.spawn_points = spawns;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainConfig;

    fn volume(scale: f32) -> TerrainVolume {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        TerrainVolume::new([32, 32, 32], scale, config).unwrap()
    }

    fn air_count(volume: &TerrainVolume) -> usize {
        let surface = volume.config().surface_value;
        volume.field().as_slice().iter().filter(|&&v| v > surface).count()
    }

    #[test]
    fn test_cave_counts_by_scale() {
        let params = CaveParams::default();
        assert_eq!(params.cave_counts(16.0), [10, 0, 0]);
        assert_eq!(params.cave_counts(32.0), [10, 2, 0]);
        assert_eq!(params.cave_counts(64.0), [10, 2, 2]);
    }

    #[test]
    fn test_generate_fill() {
        let mut volume = volume(8.0);
        volume.generate_fill();
        assert!(volume.field().as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_generate_sphere() {
        let mut volume = volume(8.0);
        volume.generate_sphere();
        assert_eq!(volume.get_pixel(IVec3::splat(16)), 0);
        assert_eq!(volume.get_pixel(IVec3::ZERO), 255);
        volume.remesh_all();
        assert!(volume.triangle_count() > 0);
    }

    #[test]
    fn test_generate_cheese() {
        let mut volume = volume(8.0);
        volume.generate_cheese(&mut Pcg64Mcg::seed_from_u64(5));
        // Floor and top layers are open
        assert!(volume.get_pixel(IVec3::new(10, 0, 10)) > volume.config().surface_value);
        assert!(volume.get_pixel(IVec3::new(10, 25, 10)) > volume.config().surface_value);
        // Outside the wedge is open; holes may lower it but never below the surface
        assert!(volume.get_pixel(IVec3::new(31, 5, 0)) > volume.config().surface_value);
        assert!(air_count(&volume) < 32 * 32 * 32);
    }

    #[test]
    fn test_generate_cave_carves_and_spawns() {
        let mut volume = volume(8.0);
        volume.generate_cave(2, 1234);
        assert_eq!(volume.seed(), 1234);
        assert!(air_count(&volume) > 0);
        assert!(!volume.structure_points().is_empty());
        assert_eq!(volume.spawn_points().len(), 2);

        // Every carve point respects the wall margin
        let extent = volume.transform().scale;
        for point in volume.structure_points() {
            assert!(point.pos.cmpge(Vec3::splat(1.8 - 1e-3)).all(), "{:?}", point.pos);
            assert!(point.pos.cmple(extent - Vec3::splat(1.8 - 1e-3)).all(), "{:?}", point.pos);
        }
        // Spawns snapped onto carve points
        for spawn in volume.spawn_points() {
            assert!(volume.structure_points().iter().any(|p| p.pos == *spawn));
        }
    }

    #[test]
    fn test_generate_cave_is_deterministic() {
        let mut a = volume(8.0);
        let mut b = volume(8.0);
        a.generate_cave(2, 77);
        b.generate_cave(2, 77);
        assert_eq!(a.field(), b.field());
        assert_eq!(a.spawn_points(), b.spawn_points());

        let mut c = volume(8.0);
        c.generate_cave(2, 78);
        assert_ne!(a.field(), c.field());
    }

    #[test]
    fn test_generate_cave_clamps_players() {
        let mut volume = volume(8.0);
        volume.generate_cave(12, 3);
        assert_eq!(volume.spawn_points().len(), SPAWN_TABLE.len());
    }
}
