//! Spatial indexing over bounding boxes.
//!
//! Chunks index their triangles and the volume indexes its chunks through the
//! same [`SpatialIndex`] seam, so the octree can be swapped for another
//! structure without touching meshing or raycasting.

pub mod octree;

pub use octree::Octree;

use crate::math::{Aabb, Frustum, Ray};

/// Bounding-volume index answering frustum and ray queries.
pub trait SpatialIndex<T> {
    /// Reset the index to cover `bounds`.
    ///
    /// `max_depth` caps subdivision, a leaf splits once it holds more than
    /// `split_threshold` items, and `capacity` pre-sizes item storage.
    fn initialize(&mut self, bounds: Aabb, max_depth: u32, split_threshold: usize, capacity: usize);

    /// Insert an item with its bounds. With `rebalance` the receiving leaf is
    /// split immediately when it overflows; otherwise call [`rebalance`](Self::rebalance)
    /// after a batch of inserts.
    fn insert(&mut self, bounds: Aabb, item: T, rebalance: bool);

    /// Split every overflowing leaf.
    fn rebalance(&mut self);

    /// Items whose bounds intersect the frustum.
    fn cull_by_frustum(&self, frustum: &Frustum) -> Vec<&T>;

    /// Items whose bounds the ray enters within `max_distance`, paired with
    /// the entry distance (0 when the origin is inside the bounds).
    fn cull_by_ray(&self, ray: &Ray, max_distance: f32) -> Vec<(f32, &T)>;

    /// Every stored item in insertion order.
    fn items(&self) -> Vec<&T>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
