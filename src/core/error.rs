//! Error types for the terrain crate

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid terrain dimensions {size:?} for a {grid}^3 chunk grid")]
    InvalidDimensions { size: [usize; 3], grid: usize },

    #[error("Terrain error: {0}")]
    Terrain(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
