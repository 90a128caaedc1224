//! Cavern - chunked Marching Cubes terrain with incremental remeshing,
//! two-tier raycasting and L-system cave carving

pub mod core;
pub mod math;
pub mod spatial;
pub mod terrain;
pub mod procgen;
