//! # Errors
//!
//! Every fallible operation in the crate returns [`VoxelResult`]. Failures scoped to a single
//! chunk (`GenerationFailure`, `MeshBuildFailure`) are retryable and never abort a streaming tick.

use thiserror::Error;

use crate::world::chunk::ChunkCoord;

/// Result alias used throughout the crate.
pub type VoxelResult<T> = Result<T, VoxelError>;

/// Errors produced by chunk storage, generation, meshing, streaming and persistence.
#[derive(Debug, Error)]
pub enum VoxelError {
    /// An operation was attempted on a chunk that is not in a state that allows it,
    /// e.g. editing a voxel of a chunk that is not resident.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A world position or height lies outside the representable range.
    #[error("position ({x}, {y}, {z}) is out of bounds")]
    OutOfBounds {
        /// World x.
        x: i32,
        /// World y.
        y: i32,
        /// World z.
        z: i32,
    },

    /// Terrain generation (or loading from persistence) failed for one chunk.
    #[error("generation failed for chunk {coord}: {reason}")]
    GenerationFailure {
        /// Chunk that failed.
        coord: ChunkCoord,
        /// Human readable cause.
        reason: String,
    },

    /// Mesh building failed for one chunk.
    #[error("mesh build failed for chunk {coord}: {reason}")]
    MeshBuildFailure {
        /// Chunk that failed.
        coord: ChunkCoord,
        /// Human readable cause.
        reason: String,
    },

    /// An allocation could not be satisfied.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Persisted chunk data did not pass validation.
    #[error("corrupt chunk data: {0}")]
    CorruptData(String),

    /// Filesystem error from a persistence backend.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl VoxelError {
    /// Returns `true` for failures the streamer retries on a later tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VoxelError::GenerationFailure { .. }
                | VoxelError::MeshBuildFailure { .. }
                | VoxelError::ResourceExhausted(_)
                | VoxelError::Io(_)
        )
    }
}
