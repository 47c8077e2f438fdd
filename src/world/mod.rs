//! # World Module
//!
//! Voxel data: block types, chunks, the chunk store and the read-only occupancy view used by
//! physics.

pub mod block;
pub mod chunk;
pub mod occupancy;
pub mod store;

pub use occupancy::OccupancyQuery;
pub use store::ChunkStore;
