//! Dense 3D grid of density samples.
//!
//! 0 is full material, 255 is air. Samples are stored x-fastest:
//! `index = x + y * size_x + z * size_x * size_y`.

use crate::core::types::{IVec3, Vec3};

/// Flat density buffer with bounds-checked access.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DensityField {
    size: [usize; 3],
    data: Vec<u8>,
}

impl DensityField {
    /// Allocate a field filled with `value`.
    pub fn new(size: [usize; 3], value: u8) -> Self {
        Self {
            size,
            data: vec![value; size[0] * size[1] * size[2]],
        }
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    /// Field dimensions as a float vector
    pub fn size_f32(&self) -> Vec3 {
        Vec3::new(self.size[0] as f32, self.size[1] as f32, self.size[2] as f32)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw samples in storage order
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Linear index of an in-bounds sample
    pub fn index_of(&self, p: IVec3) -> Option<usize> {
        let [sx, sy, sz] = self.size;
        if p.x < 0 || p.y < 0 || p.z < 0 {
            return None;
        }
        let (x, y, z) = (p.x as usize, p.y as usize, p.z as usize);
        if x >= sx || y >= sy || z >= sz {
            return None;
        }
        Some(x + y * sx + z * sx * sy)
    }

    /// Check whether a sample coordinate lies inside the field
    pub fn contains(&self, p: IVec3) -> bool {
        self.index_of(p).is_some()
    }

    pub fn get(&self, p: IVec3) -> Option<u8> {
        self.index_of(p).map(|i| self.data[i])
    }

    /// Read a sample, substituting `sentinel` outside the field.
    pub fn get_or(&self, p: IVec3, sentinel: u8) -> u8 {
        self.get(p).unwrap_or(sentinel)
    }

    /// Write a sample. Out-of-range writes are dropped and return false.
    pub fn set(&mut self, p: IVec3, value: u8) -> bool {
        match self.index_of(p) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Overwrite every sample
    pub fn fill(&mut self, value: u8) {
        self.data.fill(value);
    }

    /// Trilinear sample at a fractional data-space position.
    pub fn sample(&self, pos: Vec3, sentinel: u8) -> f32 {
        let base = pos.floor();
        let frac = pos - base;
        let base = base.as_ivec3();
        let corner = |dx: i32, dy: i32, dz: i32| {
            self.get_or(base + IVec3::new(dx, dy, dz), sentinel) as f32
        };
        let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

        let bottom = lerp(
            lerp(corner(0, 0, 0), corner(1, 0, 0), frac.x),
            lerp(corner(0, 0, 1), corner(1, 0, 1), frac.x),
            frac.z,
        );
        let top = lerp(
            lerp(corner(0, 1, 0), corner(1, 1, 0), frac.x),
            lerp(corner(0, 1, 1), corner(1, 1, 1), frac.x),
            frac.z,
        );
        lerp(bottom, top, frac.y)
    }

    /// Central-difference gradient at a data-space position, scaled to
    /// [-1, 1] per axis. Points toward air.
    pub fn flow(&self, pos: Vec3, step: f32, sentinel: u8) -> Vec3 {
        let diff = |offset: Vec3| {
            (self.sample(pos + offset, sentinel) - self.sample(pos - offset, sentinel)) / 255.0
        };
        Vec3::new(
            diff(Vec3::new(step, 0.0, 0.0)),
            diff(Vec3::new(0.0, step, 0.0)),
            diff(Vec3::new(0.0, 0.0, step)),
        )
    }

    /// Memory held by the samples, in bytes
    pub fn byte_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<u8>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut field = DensityField::new([4, 5, 6], 0);
        let p = IVec3::new(3, 4, 5);
        assert!(field.set(p, 42));
        assert_eq!(field.get(p), Some(42));
        assert_eq!(field.as_slice()[3 + 4 * 4 + 5 * 4 * 5], 42);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut field = DensityField::new([4, 4, 4], 7);
        assert!(!field.set(IVec3::new(4, 0, 0), 1));
        assert!(!field.set(IVec3::new(-1, 0, 0), 1));
        // A row overflow must not wrap into the next row
        assert_eq!(field.get(IVec3::new(4, 0, 0)), None);
        assert_eq!(field.get_or(IVec3::new(0, -1, 0), 100), 100);
        assert!(field.as_slice().iter().all(|&v| v == 7));
    }

    #[test]
    fn test_trilinear_sample() {
        let mut field = DensityField::new([2, 2, 2], 0);
        for z in 0..2 {
            for y in 0..2 {
                field.set(IVec3::new(1, y, z), 200);
            }
        }
        assert_eq!(field.sample(Vec3::new(0.0, 0.0, 0.0), 255), 0.0);
        assert!((field.sample(Vec3::new(0.5, 0.3, 0.7), 200) - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_flow_points_to_air() {
        let mut field = DensityField::new([5, 5, 5], 0);
        for z in 0..5 {
            for y in 0..5 {
                for x in 3..5 {
                    field.set(IVec3::new(x, y, z), 255);
                }
            }
        }
        let flow = field.flow(Vec3::splat(2.0), 1.0, 100);
        assert!(flow.x > 0.0);
        assert_eq!(flow.y, 0.0);
        assert_eq!(flow.z, 0.0);
    }
}
