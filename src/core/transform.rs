//! World placement of a terrain volume

use serde::{Deserialize, Serialize};
use super::types::{Mat3, Mat4, Quat, Vec3};

/// Position, rotation and non-uniform scale of a scene object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self { position, rotation, scale }
    }

    pub fn from_scale(scale: Vec3) -> Self {
        Self { scale, ..Default::default() }
    }

    /// Local-to-world matrix (scale, then rotate, then translate)
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// World-to-local matrix
    pub fn inverse_matrix(&self) -> Mat4 {
        self.matrix().inverse()
    }

    /// Matrix for carrying local normals into world space (inverse-transpose).
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.matrix()).inverse().transpose()
    }
}

/// Transform a direction by an inverse-transpose matrix and renormalize.
pub fn transform_normal(normal_matrix: &Mat3, normal: Vec3) -> Vec3 {
    (*normal_matrix * normal).normalize_or_zero()
}
