//! Queue of chunks waiting for a remesh.

use super::chunk::ChunkCoord;

/// Deduplicated chunk queue for a fixed `grid_size`^3 grid.
///
/// Membership is a bitset indexed by the chunk's linear index, so queueing
/// is O(1) regardless of how many edits touch the same chunk. Iteration
/// follows insertion order.
#[derive(Clone, Debug, Default)]
pub struct DirtyQueue {
    grid_size: usize,
    lookup: Vec<u64>,
    queue: Vec<ChunkCoord>,
}

impl DirtyQueue {
    pub fn new(grid_size: usize) -> Self {
        let count = grid_size * grid_size * grid_size;
        Self {
            grid_size,
            lookup: vec![0; count.div_ceil(64)],
            queue: Vec::new(),
        }
    }

    /// Linear index of an in-grid coordinate
    fn linear_index(&self, coord: ChunkCoord) -> Option<usize> {
        let n = self.grid_size as i32;
        let in_range = |v: i32| (0..n).contains(&v);
        if !(in_range(coord.x) && in_range(coord.y) && in_range(coord.z)) {
            return None;
        }
        let n = self.grid_size;
        Some(coord.x as usize + coord.y as usize * n + coord.z as usize * n * n)
    }

    /// Queue a chunk. Returns false when out of range or already queued.
    pub fn push(&mut self, coord: ChunkCoord) -> bool {
        let Some(index) = self.linear_index(coord) else {
            return false;
        };
        let (word, bit) = (index / 64, 1u64 << (index % 64));
        if self.lookup[word] & bit != 0 {
            return false;
        }
        self.lookup[word] |= bit;
        self.queue.push(coord);
        true
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.linear_index(coord)
            .is_some_and(|index| self.lookup[index / 64] & (1 << (index % 64)) != 0)
    }

    /// Queued chunks in insertion order
    pub fn as_slice(&self) -> &[ChunkCoord] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Empty the queue and reset membership.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.lookup.fill(0);
    }
}
