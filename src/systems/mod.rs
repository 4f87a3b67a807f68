pub mod batch;
pub mod export;
pub mod grid;
pub mod network;
