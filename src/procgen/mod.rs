//! Procedural cave generation: L-system sentences walked by a carving turtle

pub mod carver;
pub mod cave;
pub mod lsystem;

pub use carver::{CaveCarver, StructurePoint};
pub use cave::{CaveParams, SPAWN_TABLE};
pub use lsystem::{LSystem, Rule};
