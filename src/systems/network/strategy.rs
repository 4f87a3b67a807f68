use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RoadGenError;
use crate::systems::grid;
use super::poly::voronoi;
use super::{junction, GenerationContext, Params, Segment};

/// Interchangeable candidate network generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStrategy {
    Grid,
    Voronoi,
    Cluster,
    Pathfinder,
}

impl NetworkStrategy {
    pub fn tag(&self) -> &'static str {
        match self {
            NetworkStrategy::Grid => "grid",
            NetworkStrategy::Voronoi => "voronoi",
            NetworkStrategy::Cluster => "cluster",
            NetworkStrategy::Pathfinder => "pathfinder",
        }
    }
}

impl fmt::Display for NetworkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for NetworkStrategy {
    type Err = RoadGenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "grid" => Ok(NetworkStrategy::Grid),
            "voronoi" => Ok(NetworkStrategy::Voronoi),
            "cluster" => Ok(NetworkStrategy::Cluster),
            "pathfinder" => Ok(NetworkStrategy::Pathfinder),
            other => Err(RoadGenError::Input(format!("unknown strategy '{}'", other))),
        }
    }
}

// small settlements get a plain grid, mid-sized ones follow their clusters,
// large ones get a skeleton plus routed main roads
pub fn select_strategy(building_count: usize, params: &Params) -> NetworkStrategy {
    if building_count < params.grid_strategy_max_buildings {
        NetworkStrategy::Grid
    } else if building_count < params.cluster_strategy_max_buildings {
        NetworkStrategy::Cluster
    } else {
        NetworkStrategy::Pathfinder
    }
}

/// Raw centerline candidates, before collision pruning.
/// Pathfinder uses the voronoi skeleton; its routes are planned later on the pruned graph.
pub fn generate_candidates(strategy: NetworkStrategy, ctx: &GenerationContext) -> Result<Vec<Segment>, RoadGenError> {
    match strategy {
        NetworkStrategy::Grid => Ok(grid::grid_backbone(ctx)),
        NetworkStrategy::Voronoi | NetworkStrategy::Pathfinder => voronoi::voronoi_skeleton(ctx),
        NetworkStrategy::Cluster => Ok(junction::junction_network(ctx)),
    }
}
