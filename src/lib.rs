// road network synthesis from building footprints

pub mod config;
pub mod error;
pub mod systems;

pub use error::RoadGenError;
pub use systems::network::{
    generate_road_network, GenerationReport, Params, RoadNetwork, Segment, SegmentRole,
};
pub use systems::network::hierarchy::{ClassifiedRoad, RoadTier};
pub use systems::network::settlement::{Building, Settlement};
pub use systems::network::strategy::NetworkStrategy;
