// geometry helpers for candidate generation

pub mod point_gen;
pub mod voronoi;
pub mod utils;
