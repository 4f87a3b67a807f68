use thiserror::Error;

/// Errors raised while turning building footprints into a road network.
#[derive(Error, Debug)]
pub enum RoadGenError {
    /// Missing or unusable buildings
    #[error("input error: {0}")]
    Input(String),

    /// A strategy refused its input (degenerate triangulation, too few vertices, ...)
    #[error("geometry error: {0}")]
    Geometry(String),

    #[error("no path from gateway {gateway} to point of interest {poi}")]
    NoPathFound { gateway: usize, poi: usize },

    #[error("{nodes} network nodes could not be bridged within {max_bridge_m} m")]
    DisconnectedRemainder { nodes: usize, max_bridge_m: f64 },

    #[error("no roads could be produced for {city}")]
    NoRoadsProduced { city: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoadGenError>;
