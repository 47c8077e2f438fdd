//! # Persistence
//!
//! The streamer's save/load contract. On eviction a modified chunk is handed to
//! [`ChunkPersistence::persist`]; the first time a coordinate is loaded,
//! [`ChunkPersistence::try_load`] is asked before terrain generation, and data it returns is used
//! verbatim.
//!
//! Backends are shared with worker threads, so they must be `Send + Sync`.

mod file;
mod memory;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;

use crate::error::VoxelResult;
use crate::world::block::Voxel;
use crate::world::chunk::ChunkCoord;

/// Storage for chunk voxel arrays.
pub trait ChunkPersistence: Send + Sync {
    /// Stores the full voxel array of a chunk, replacing any earlier copy.
    fn persist(&self, coord: ChunkCoord, voxels: &[Voxel]) -> VoxelResult<()>;

    /// Returns the stored voxels for `coord`, or `None` if nothing was stored.
    fn try_load(&self, coord: ChunkCoord) -> VoxelResult<Option<Box<[Voxel]>>>;
}
