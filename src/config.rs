// Configuration file, All measurements in real-world meters unless noted
// This controls the initial generation parameter settings

// Input coordinates are usually geographic degrees, 1 degree is roughly 111 km
pub const METERS_PER_UNIT: f64 = 111_000.0;

pub const INITIAL_SEED: u64 = 1512086461918454205;

// Settlement boundary parameters
pub const BOUNDARY_BUFFER: f64 = 100.0;          // Hull expansion around the building footprints
pub const CIRCLE_RADIUS_FACTOR: f64 = 3.0;       // Circle boundary radius = factor * buffer, for tiny settlements
pub const BOUNDARY_CIRCLE_SEGMENTS: usize = 64;  // Vertices used to approximate a circular boundary
pub const BUFFER_ARC_SEGMENTS: usize = 16;       // Vertices per hull corner when buffering

// Collision parameters
pub const EXCLUSION_MARGIN: f64 = 5.0;     // Safety margin around every building footprint
pub const MIN_SEGMENT_LENGTH: f64 = 5.0;   // Shorter road pieces are discarded
pub const NODE_SNAP: f64 = 0.01;           // Endpoints closer than this share a graph node

// Strategy selection (building counts)
pub const GRID_STRATEGY_MAX_BUILDINGS: usize = 50;
pub const CLUSTER_STRATEGY_MAX_BUILDINGS: usize = 500;

// Grid backbone parameters
pub const GRID_SPACING_SMALL: f64 = 80.0;         // Spacing for settlements under SMALL_SETTLEMENT_EXTENT
pub const GRID_SPACING_LARGE: f64 = 200.0;
pub const SMALL_SETTLEMENT_EXTENT: f64 = 1_000.0;

// Voronoi skeleton parameters
pub const VORONOI_BOUNDARY_SAMPLES: usize = 20;          // Boundary points added to the triangulation
pub const CIRCUMCENTER_MERGE_THRESHOLD: f64 = 0.5;       // merge circumcenters closer than this distance

// Density-adaptive junction grid parameters
pub const CLUSTER_EPS: f64 = 100.0;              // Neighbourhood radius for density clustering
pub const CLUSTER_MIN_SAMPLES: usize = 3;        // Neighbours (self included) needed for a core building
pub const CLUSTER_MARGIN: f64 = 40.0;            // Cluster region expansion around its footprints
pub const JUNCTION_SPACING_FACTOR: f64 = 1.5;    // spacing = sqrt(area per building) * factor
pub const JUNCTION_SPACING_MIN: f64 = 25.0;
pub const JUNCTION_SPACING_MAX: f64 = 200.0;
pub const JUNCTION_JITTER: f64 = 0.0;            // Std deviation of junction displacement, 0 keeps a clean grid

// POI routing parameters
pub const MAX_GATEWAYS: usize = 4;
pub const MAX_POIS: usize = 8;

// Access road parameters
pub const MAX_ACCESS_DISTANCE: f64 = 200.0;
pub const ACCESS_CANDIDATES: usize = 8;     // Nearest network nodes tried per building

// Connectivity repair parameters
pub const MAX_BRIDGE_LENGTH: f64 = 1_200.0;
pub const BRIDGE_CANDIDATES: usize = 16;    // Nearest dominant nodes tried per component node

// Hierarchy parameters
pub const PROXIMITY_DISTANCE: f64 = 50.0;   // Roads this close to notable buildings are promoted

// Batch processing
pub const BATCH_TIMEOUT_SECS: u64 = 60;
