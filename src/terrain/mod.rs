//! Chunked Marching Cubes terrain
//!
//! A [`TerrainVolume`] owns the density field and a fixed grid of [`Chunk`]s.
//! Edits rewrite the field and queue chunks; remeshing re-triangulates the
//! queued chunks in parallel.

pub mod chunk;
pub mod config;
pub mod decor;
pub mod density;
pub mod dirty;
pub mod edit;
pub mod physics;
pub mod query;
pub mod raycast;
pub mod render;
pub mod snapshot;
pub mod tables;
pub mod volume;

pub use chunk::{Chunk, ChunkCoord, TerrainVertex, Triangle};
pub use config::TerrainConfig;
pub use decor::{DecorCollection, DecorInstance, TerrainPalette};
pub use density::DensityField;
pub use dirty::DirtyQueue;
pub use physics::{ColliderHandle, PhysicsBackend};
pub use raycast::{RayHit, RaycastInfo};
pub use render::{ChunkDraw, RenderPass, RenderSink};
pub use snapshot::TerrainSnapshot;
pub use volume::TerrainVolume;
