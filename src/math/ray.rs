//! Ray type and intersection tests

use crate::core::types::{Vec3, Mat4};
use super::aabb::Aabb;

/// Determinant below which a ray is treated as parallel to a triangle
const TRIANGLE_EPSILON: f32 = 1e-8;

/// Slack on the barycentric bounds so rays through shared edges and vertices
/// hit at least one of the adjoining triangles
const BARYCENTRIC_EPSILON: f32 = 1e-6;

/// A ray defined by origin and direction
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Precomputed 1/direction for fast AABB intersection
    pub inv_direction: Vec3,
}

impl Ray {
    /// Create a new ray (direction should be normalized)
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: Vec3::new(
                1.0 / direction.x,
                1.0 / direction.y,
                1.0 / direction.z,
            ),
        }
    }

    /// Get point along ray at parameter t
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray-AABB intersection using slab method
    /// Returns Some((t_near, t_far)) if intersection, None otherwise
    ///
    /// An axis the ray does not move along only checks that the origin lies
    /// inside that slab, faces included.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> Option<(f32, f32)> {
        let mut t_near = f32::NEG_INFINITY;
        let mut t_far = f32::INFINITY;

        for axis in 0..3 {
            let origin = self.origin[axis];
            if self.direction[axis] == 0.0 {
                if origin < aabb.min[axis] || origin > aabb.max[axis] {
                    return None;
                }
                continue;
            }
            let t1 = (aabb.min[axis] - origin) * self.inv_direction[axis];
            let t2 = (aabb.max[axis] - origin) * self.inv_direction[axis];
            t_near = t_near.max(t1.min(t2));
            t_far = t_far.min(t1.max(t2));
        }

        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }

    /// Möller–Trumbore ray-triangle intersection.
    ///
    /// Returns the ray parameter of the hit. Both faces count as hits.
    pub fn intersects_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < TRIANGLE_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.origin - v0;
        let u = s.dot(p) * inv_det;
        if !(-BARYCENTRIC_EPSILON..=1.0 + BARYCENTRIC_EPSILON).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < -BARYCENTRIC_EPSILON || u + v > 1.0 + BARYCENTRIC_EPSILON {
            return None;
        }

        let t = edge2.dot(q) * inv_det;
        (t >= 0.0).then_some(t)
    }

    /// Transform a ray segment of length `distance` by matrix.
    ///
    /// Returns the transformed ray and the segment length in the new space.
    pub fn transform_segment(&self, matrix: &Mat4, distance: f32) -> (Ray, f32) {
        let start = matrix.transform_point3(self.origin);
        let end = matrix.transform_point3(self.at(distance));
        let new_direction = matrix.transform_vector3(self.direction).normalize();
        (Ray::new(start, new_direction), (end - start).length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        assert_eq!(ray.at(5.0), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_intersects_aabb_hit() {
        let ray = Ray::new(Vec3::new(-2.0, 0.5, 0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let hit = ray.intersects_aabb(&aabb);
        assert!(hit.is_some());
        let (t_near, t_far) = hit.unwrap();
        assert!((t_near - 2.0).abs() < 0.001);
        assert!((t_far - 3.0).abs() < 0.001);
    }

    #[test]
    fn test_intersects_aabb_inside() {
        let ray = Ray::new(Vec3::splat(0.5), Vec3::X);
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let (t_near, _) = ray.intersects_aabb(&aabb).unwrap();
        assert_eq!(t_near, 0.0);
    }

    #[test]
    fn test_intersects_aabb_on_face_plane() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        // Travels inside the y = 0 and z = 1 face planes
        let along_edge = Ray::new(Vec3::new(-1.0, 0.0, 1.0), Vec3::X);
        let (t_near, t_far) = along_edge.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 1.0).abs() < 1e-6);
        assert!((t_far - 2.0).abs() < 1e-6);

        // Straight down through the x = 1 face
        let down = Ray::new(Vec3::new(1.0, 3.0, 0.5), Vec3::NEG_Y);
        let (t_near, _) = down.intersects_aabb(&aabb).unwrap();
        assert!((t_near - 2.0).abs() < 1e-6);

        // Parallel and just outside the slab
        let outside = Ray::new(Vec3::new(-1.0, 1.001, 0.5), Vec3::X);
        assert!(outside.intersects_aabb(&aabb).is_none());
    }

    #[test]
    fn test_intersects_triangle_shared_edge() {
        // Two triangles splitting a unit square along its diagonal
        let (a, b, c, d) = (
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(0.0, 1.0, 1.0),
        );
        let ray = Ray::new(Vec3::new(0.5, 0.5, 0.0), Vec3::Z);
        let first = ray.intersects_triangle(a, b, c);
        let second = ray.intersects_triangle(a, c, d);
        assert!(first.is_some() || second.is_some());
    }

    #[test]
    fn test_intersects_triangle() {
        let v0 = Vec3::new(0.0, 0.0, 1.0);
        let v1 = Vec3::new(1.0, 0.0, 1.0);
        let v2 = Vec3::new(0.0, 1.0, 1.0);

        let hit = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::Z);
        let t = hit.intersects_triangle(v0, v1, v2).unwrap();
        assert!((t - 1.0).abs() < 1e-6);

        // Outside the triangle's hypotenuse
        let miss = Ray::new(Vec3::new(0.75, 0.75, 0.0), Vec3::Z);
        assert!(miss.intersects_triangle(v0, v1, v2).is_none());

        // Triangle behind the origin
        let behind = Ray::new(Vec3::new(0.25, 0.25, 2.0), Vec3::Z);
        assert!(behind.intersects_triangle(v0, v1, v2).is_none());

        // Parallel
        let parallel = Ray::new(Vec3::new(0.25, 0.25, 0.0), Vec3::X);
        assert!(parallel.intersects_triangle(v0, v1, v2).is_none());
    }

    #[test]
    fn test_transform_segment_scales_distance() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let (local, distance) = ray.transform_segment(&Mat4::from_scale(Vec3::splat(4.0)), 2.0);
        assert!((distance - 8.0).abs() < 1e-5);
        assert_eq!(local.direction, Vec3::X);
    }
}
