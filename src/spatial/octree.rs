//! Octree storing each item in the deepest node that fully contains it.
//!
//! Nodes live in a flat array; children of a split node are allocated as eight
//! consecutive entries. Items are stored once in `entries` and referenced by
//! index from their node, so splitting only moves indices.

use crate::math::{Aabb, Frustum, Ray};
use super::SpatialIndex;

/// Sentinel for "no children"
const NO_CHILDREN: u32 = u32::MAX;

#[derive(Clone, Debug)]
struct OctreeNode {
    bounds: Aabb,
    depth: u32,
    /// Index of the first of eight children in `nodes`
    first_child: u32,
    /// Indices into `entries`
    items: Vec<u32>,
}

impl OctreeNode {
    fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            depth,
            first_child: NO_CHILDREN,
            items: Vec::new(),
        }
    }

    fn is_leaf(&self) -> bool {
        self.first_child == NO_CHILDREN
    }
}

/// Octree over axis-aligned bounds.
#[derive(Clone, Debug)]
pub struct Octree<T> {
    nodes: Vec<OctreeNode>,
    entries: Vec<(Aabb, T)>,
    max_depth: u32,
    split_threshold: usize,
}

impl<T> Default for Octree<T> {
    fn default() -> Self {
        Self {
            nodes: vec![OctreeNode::new(Aabb::default(), 0)],
            entries: Vec::new(),
            max_depth: 0,
            split_threshold: usize::MAX,
        }
    }
}

impl<T> Octree<T> {
    /// Create an initialized octree.
    pub fn new(bounds: Aabb, max_depth: u32, split_threshold: usize, capacity: usize) -> Self {
        let mut tree = Self::default();
        tree.initialize(bounds, max_depth, split_threshold, capacity);
        tree
    }

    /// Root bounds.
    pub fn bounds(&self) -> Aabb {
        self.nodes[0].bounds
    }

    /// Number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Find the deepest existing node that fully contains `bounds`.
    fn find_node(&self, bounds: &Aabb) -> usize {
        let mut index = 0;
        loop {
            let node = &self.nodes[index];
            if node.is_leaf() {
                return index;
            }
            let first = node.first_child as usize;
            match (first..first + 8).find(|&child| self.nodes[child].bounds.contains(bounds)) {
                Some(child) => index = child,
                None => return index,
            }
        }
    }

    /// Split a leaf into eight children and push down what fits.
    fn split(&mut self, index: usize) {
        let (bounds, depth) = {
            let node = &self.nodes[index];
            if !node.is_leaf()
                || node.depth >= self.max_depth
                || node.items.len() <= self.split_threshold
            {
                return;
            }
            (node.bounds, node.depth)
        };

        let first_child = self.nodes.len();
        for octant in 0..8u8 {
            self.nodes.push(OctreeNode::new(bounds.child_octant(octant), depth + 1));
        }
        self.nodes[index].first_child = first_child as u32;

        let items = std::mem::take(&mut self.nodes[index].items);
        let mut kept = Vec::new();
        for item in items {
            let item_bounds = self.entries[item as usize].0;
            match (first_child..first_child + 8)
                .find(|&child| self.nodes[child].bounds.contains(&item_bounds))
            {
                Some(child) => self.nodes[child].items.push(item),
                None => kept.push(item),
            }
        }
        self.nodes[index].items = kept;

        for child in first_child..first_child + 8 {
            self.split(child);
        }
    }

    /// Depth-first walk over nodes accepted by `visit_node`, yielding items
    /// accepted by `visit_item`.
    fn walk<'a, F, G, R>(&'a self, visit_node: F, mut visit_item: G) -> Vec<R>
    where
        F: Fn(&Aabb) -> bool,
        G: FnMut(&Aabb, &'a T) -> Option<R>,
    {
        let mut out = Vec::new();
        if self.entries.is_empty() {
            return out;
        }
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !visit_node(&node.bounds) {
                continue;
            }
            for &item in &node.items {
                let (bounds, value) = &self.entries[item as usize];
                if let Some(result) = visit_item(bounds, value) {
                    out.push(result);
                }
            }
            if !node.is_leaf() {
                let first = node.first_child as usize;
                stack.extend(first..first + 8);
            }
        }
        out
    }
}

impl<T> SpatialIndex<T> for Octree<T> {
    fn initialize(&mut self, bounds: Aabb, max_depth: u32, split_threshold: usize, capacity: usize) {
        self.nodes.clear();
        self.nodes.push(OctreeNode::new(bounds, 0));
        self.entries.clear();
        self.entries.reserve(capacity);
        self.max_depth = max_depth;
        self.split_threshold = split_threshold.max(1);
    }

    fn insert(&mut self, bounds: Aabb, item: T, rebalance: bool) {
        let entry = self.entries.len() as u32;
        self.entries.push((bounds, item));
        let node = self.find_node(&bounds);
        self.nodes[node].items.push(entry);
        if rebalance {
            self.split(node);
        }
    }

    fn rebalance(&mut self) {
        // Children appended during a split are handled by the recursive call
        let mut index = 0;
        while index < self.nodes.len() {
            self.split(index);
            index += 1;
        }
    }

    fn cull_by_frustum(&self, frustum: &Frustum) -> Vec<&T> {
        self.walk(
            |bounds| frustum.intersects_aabb(bounds),
            |bounds, value| frustum.intersects_aabb(bounds).then_some(value),
        )
    }

    fn cull_by_ray(&self, ray: &Ray, max_distance: f32) -> Vec<(f32, &T)> {
        let within = |bounds: &Aabb| {
            ray.intersects_aabb(bounds)
                .filter(|(t_near, _)| *t_near <= max_distance)
                .map(|(t_near, _)| t_near)
        };
        self.walk(
            |bounds| within(bounds).is_some(),
            |bounds, value| within(bounds).map(|t| (t, value)),
        )
    }

    fn items(&self) -> Vec<&T> {
        self.entries.iter().map(|(_, value)| value).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
