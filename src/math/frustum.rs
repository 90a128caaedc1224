//! View frustum supplied by the renderer, tested against chunk bounds

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Build from `(a, b, c, d)` coefficients, normalizing the normal
    fn from_coefficients(plane: Vec4) -> Self {
        let normal = plane.truncate();
        let len = normal.length();
        if len <= f32::EPSILON {
            return Self::new(Vec3::ZERO, plane.w);
        }
        Self::new(normal / len, plane.w / len)
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// View frustum with 6 planes (Near, Far, Left, Right, Top, Bottom)
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extract frustum planes from view-projection matrix (Gribb-Hartmann)
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (vp.row(0), vp.row(1), vp.row(2), vp.row(3));
        Self {
            planes: [
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r1),
            ],
        }
    }

    /// Re-express the frustum in the local space of an object.
    ///
    /// `local_to_world` maps object space into the space the planes live in.
    pub fn transformed(&self, local_to_world: &Mat4) -> Frustum {
        let transpose = local_to_world.transpose();
        let planes = self.planes.map(|plane| {
            Plane::from_coefficients(transpose * plane.normal.extend(plane.distance))
        });
        Frustum { planes }
    }

    /// Check if point is inside frustum
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes.iter().all(|plane| plane.distance_to_point(point) >= 0.0)
    }

    /// Check if AABB intersects frustum (conservative test)
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            // p-vertex: the corner furthest along the plane normal
            let p = Vec3::select(plane.normal.cmpge(Vec3::ZERO), aabb.max, aabb.min);
            plane.distance_to_point(p) >= 0.0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let proj = Mat4::orthographic_rh(-1.0, 1.0, -1.0, 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_plane_distance() {
        let plane = Plane::new(Vec3::Y, 0.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, 5.0, 0.0)), 5.0);
        assert_eq!(plane.distance_to_point(Vec3::new(0.0, -3.0, 0.0)), -3.0);
    }

    #[test]
    fn test_frustum_contains_point() {
        let frustum = test_frustum();
        assert!(frustum.contains_point(Vec3::ZERO));
        assert!(!frustum.contains_point(Vec3::new(3.0, 0.0, 0.0)));
    }

    #[test]
    fn test_intersects_aabb() {
        let frustum = test_frustum();
        assert!(frustum.intersects_aabb(&Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5))));
        assert!(!frustum.intersects_aabb(&Aabb::new(Vec3::splat(5.0), Vec3::splat(6.0))));
    }

    #[test]
    fn test_transformed_into_local_space() {
        let frustum = test_frustum();
        // Object whose local origin sits 10 units to the right in world space
        let local_to_world = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let local = frustum.transformed(&local_to_world);
        assert!(!local.contains_point(Vec3::ZERO));
        assert!(local.contains_point(Vec3::new(-10.0, 0.0, 0.0)));
    }
}
