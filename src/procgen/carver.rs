//! Turtle interpreter that turns L-system sentences into carve spheres.

use serde::{Deserialize, Serialize};

use crate::core::types::{Quat, Vec3};
use crate::terrain::TerrainVolume;
use super::cave::CaveParams;

/// Centre and radius of one carve sphere, relative to the volume origin in
/// world units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructurePoint {
    pub pos: Vec3,
    pub radius: f32,
}

impl StructurePoint {
    pub fn new(pos: Vec3, radius: f32) -> Self {
        Self { pos, radius }
    }
}

/// Turtle state. Branches push and pop whole copies.
#[derive(Clone, Copy, Debug)]
struct Turtle {
    position: Vec3,
    forward: Vec3,
    speed: f32,
    angle: f32,
}

impl Turtle {
    fn turn(&mut self, axis: Vec3, angle: f32) {
        self.forward = (Quat::from_axis_angle(axis, angle) * self.forward).normalize_or_zero();
    }

    /// Horizontal axis to the turtle's right; pitching about it tilts the
    /// heading toward +y. Falls back to +z when heading straight up or down.
    fn right(&self) -> Vec3 {
        self.forward.cross(Vec3::Y).normalize_or(Vec3::Z)
    }
}

/// Collects structure points from turtle walks, fits them into a volume and
/// carves them.
#[derive(Clone, Debug, Default)]
pub struct CaveCarver {
    params: CaveParams,
    points: Vec<StructurePoint>,
}

impl CaveCarver {
    pub fn new(params: CaveParams) -> Self {
        Self { params, points: Vec::new() }
    }

    pub fn structure_points(&self) -> &[StructurePoint] {
        &self.points
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Walk `sentence` from `start` heading along `direction`, appending a
    /// point for every `F`. A zero direction walks along +x.
    ///
    /// Returns the number of points added.
    pub fn create_structure_points(&mut self, sentence: &str, start: Vec3, direction: Vec3) -> usize {
        let before = self.points.len();
        let mut turtle = Turtle {
            position: start,
            forward: direction.try_normalize().unwrap_or(Vec3::X),
            speed: self.params.turtle_speed,
            angle: self.params.turtle_angle,
        };
        let mut stack: Vec<Turtle> = Vec::new();

        for symbol in sentence.chars() {
            match symbol {
                'F' => {
                    turtle.position += turtle.forward * turtle.speed;
                    self.points.push(StructurePoint::new(turtle.position, turtle.speed));
                }
                'R' => turtle.turn(Vec3::Y, turtle.angle),
                'L' => turtle.turn(Vec3::Y, -turtle.angle),
                'U' => turtle.turn(turtle.right(), turtle.angle),
                'D' => turtle.turn(turtle.right(), -turtle.angle),
                'O' => turtle.angle += self.params.angle_increment,
                'A' => turtle.angle -= self.params.angle_increment,
                'B' => turtle.speed += self.params.speed_increment,
                'S' => turtle.speed -= self.params.speed_increment,
                '[' => stack.push(turtle),
                ']' => match stack.pop() {
                    Some(saved) => turtle = saved,
                    None => log::warn!("Unbalanced ']' in cave sentence, ignoring"),
                },
                _ => {}
            }
        }

        self.points.len() - before
    }

    /// Fit all points inside `[margin, extent - margin]` per axis.
    ///
    /// An axis already inside is left alone. An axis whose spread fits is
    /// translated to the nearest valid position; otherwise it is rescaled to
    /// fill the valid range. When the valid range is empty the axis collapses
    /// to the volume's centre plane.
    pub fn adjust_points_to_terrain(&mut self, extent: Vec3) {
        if self.points.is_empty() {
            return;
        }
        let margin = self.params.wall_margin;
        for axis in 0..3 {
            let (min, max) = self
                .points
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p.pos[axis]), hi.max(p.pos[axis])));
            let target_min = margin;
            let target_max = extent[axis] - margin;

            if target_max <= target_min {
                let centre = extent[axis] * 0.5;
                self.points.iter_mut().for_each(|p| p.pos[axis] = centre);
                continue;
            }
            if min >= target_min && max <= target_max {
                continue;
            }

            if max - min > target_max - target_min {
                let factor = (target_max - target_min) / (max - min);
                for p in &mut self.points {
                    p.pos[axis] = (p.pos[axis] - min) * factor + target_min;
                }
            } else {
                let offset = if min < target_min { target_min - min } else { target_max - max };
                for p in &mut self.points {
                    p.pos[axis] += offset;
                }
            }
        }
    }

    /// [`adjust_points_to_terrain`](Self::adjust_points_to_terrain) against
    /// a volume's world extent.
    pub fn adjust_to_volume(&mut self, volume: &TerrainVolume) {
        self.adjust_points_to_terrain(volume.transform().scale);
    }

    /// Damage a sphere at every point, offset by the volume's position, then
    /// drop the points. Returns the number of spheres carved.
    pub fn carve(&mut self, volume: &mut TerrainVolume) -> usize {
        let origin = volume.transform().position;
        let smoothing = self.params.carve_smoothing;
        for point in &self.points {
            volume.damage_sphere(point.pos + origin, point.radius, smoothing);
        }
        let carved = self.points.len();
        self.points.clear();
        carved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IVec3;
    use crate::terrain::TerrainConfig;

    fn carver() -> CaveCarver {
        CaveCarver::new(CaveParams::default())
    }

    #[test]
    fn test_forward_walk() {
        let mut carver = carver();
        assert_eq!(carver.create_structure_points("FFF", Vec3::ZERO, Vec3::new(0.0, 0.0, 2.0)), 3);
        let points = carver.structure_points();
        assert!((points[2].pos - Vec3::new(0.0, 0.0, 2.4)).length() < 1e-5);
        assert!(points.iter().all(|p| p.radius == 0.8));
    }

    #[test]
    fn test_zero_direction_defaults_to_x() {
        let mut carver = carver();
        carver.create_structure_points("F", Vec3::ONE, Vec3::ZERO);
        assert!((carver.structure_points()[0].pos - Vec3::new(1.8, 1.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_speed_and_branches() {
        let mut carver = carver();
        // Branch restores position and speed
        carver.create_structure_points("[BFF]F", Vec3::ZERO, Vec3::X);
        let points = carver.structure_points();
        assert_eq!(points.len(), 3);
        assert!((points[1].pos.x - 1.8).abs() < 1e-5);
        assert!((points[1].radius - 0.9).abs() < 1e-5);
        assert!((points[2].pos.x - 0.8).abs() < 1e-5);
        assert!((points[2].radius - 0.8).abs() < 1e-5);
    }

    #[test]
    fn test_yaw_turns_about_up() {
        let mut carver = carver();
        carver.create_structure_points("RF", Vec3::ZERO, Vec3::X);
        let p = carver.structure_points()[0].pos;
        assert!(p.y.abs() < 1e-6);
        assert!((p.length() - 0.8).abs() < 1e-5);
        assert!((p.x - 0.8 * 0.5f32.cos()).abs() < 1e-5);
    }

    #[test]
    fn test_pitch_changes_elevation() {
        for heading in [Vec3::X, Vec3::NEG_X, Vec3::Z, Vec3::NEG_Z] {
            let mut carver = carver();
            carver.create_structure_points("UUUFFF", Vec3::ZERO, heading);
            let up = carver.structure_points()[2].pos;
            assert!(up.y > 2.0, "{heading} climbed to {up}");

            let mut carver = self::carver();
            carver.create_structure_points("DDDFFF", Vec3::ZERO, heading);
            assert!(carver.structure_points()[2].pos.y < -2.0);
        }
    }

    #[test]
    fn test_pitch_keeps_heading_plane() {
        let mut carver = carver();
        carver.create_structure_points("UF", Vec3::ZERO, Vec3::X);
        let p = carver.structure_points()[0].pos;
        assert!(p.z.abs() < 1e-6);
        assert!((p.y - 0.8 * 0.5f32.sin()).abs() < 1e-5);
    }

    #[test]
    fn test_unbalanced_pop_is_ignored() {
        let mut carver = carver();
        assert_eq!(carver.create_structure_points("]F", Vec3::ZERO, Vec3::X), 1);
    }

    #[test]
    fn test_adjust_translates_and_rescales() {
        let mut carver = carver();
        // Small spread beyond +x: translated
        carver.create_structure_points("FF", Vec3::new(9.0, 5.0, 5.0), Vec3::X);
        carver.adjust_points_to_terrain(Vec3::splat(10.0));
        let xs: Vec<f32> = carver.structure_points().iter().map(|p| p.pos.x).collect();
        assert!((xs[1] - 8.2).abs() < 1e-4);
        assert!((xs[1] - xs[0] - 0.8).abs() < 1e-4);
        // y and z were inside and untouched
        assert_eq!(carver.structure_points()[0].pos.y, 5.0);

        // Spread wider than the volume: rescaled onto [1.8, 8.2]
        let mut carver = self::carver();
        carver.create_structure_points(&"F".repeat(20), Vec3::new(-2.0, 5.0, 5.0), Vec3::X);
        carver.adjust_points_to_terrain(Vec3::splat(10.0));
        let points = carver.structure_points();
        assert!((points[0].pos.x - 1.8).abs() < 1e-4);
        assert!((points[19].pos.x - 8.2).abs() < 1e-4);
    }

    #[test]
    fn test_carve_clears_points() {
        let config = TerrainConfig { grid_size: 4, ..Default::default() };
        let mut volume = TerrainVolume::new([16, 16, 16], 8.0, config).unwrap();
        volume.generate_fill();
        let mut carver = carver();
        carver.create_structure_points("FFFF", Vec3::new(2.0, 4.0, 4.0), Vec3::X);
        assert_eq!(carver.carve(&mut volume), 4);
        assert!(carver.structure_points().is_empty());
        // Third point at x = 4.4 world, 8.8 samples
        assert_eq!(volume.get_pixel(IVec3::new(9, 8, 8)), 255);
        assert!(volume.has_dirty());
    }
}
