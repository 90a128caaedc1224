//! Geometry primitives shared by meshing, culling and raycasting

pub mod aabb;
pub mod ray;
pub mod frustum;

pub use aabb::Aabb;
pub use ray::Ray;
pub use frustum::{Plane, Frustum};
