//! In-memory persistence bounded by an LRU cache.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use log::debug;
use lru::LruCache;

use crate::error::{VoxelError, VoxelResult};
use crate::persistence::ChunkPersistence;
use crate::world::block::Voxel;
use crate::world::chunk::{ChunkCoord, CHUNK_VOLUME};

/// Keeps up to `capacity` chunks; storing one more forgets the least recently used.
pub struct MemoryPersistence {
    chunks: Mutex<LruCache<ChunkCoord, Box<[Voxel]>>>,
}

impl MemoryPersistence {
    /// Creates a store holding at most `capacity` chunks (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            chunks: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` if `coord` is stored.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&coord)
    }
}

impl ChunkPersistence for MemoryPersistence {
    fn persist(&self, coord: ChunkCoord, voxels: &[Voxel]) -> VoxelResult<()> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(VoxelError::InvalidState(format!(
                "persisting chunk {coord} with {} voxels",
                voxels.len()
            )));
        }
        let mut chunks = self.chunks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((dropped, _)) = chunks.push(coord, voxels.into()) {
            if dropped != coord {
                debug!("Memory persistence full, forgot chunk {dropped}");
            }
        }
        Ok(())
    }

    fn try_load(&self, coord: ChunkCoord) -> VoxelResult<Option<Box<[Voxel]>>> {
        Ok(self
            .chunks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&coord)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::block::BlockType;
    use crate::world::chunk::allocate_voxels;

    #[test]
    fn stores_and_forgets_least_recent() {
        let persistence = MemoryPersistence::new(2);
        let mut voxels = allocate_voxels().unwrap();
        voxels[7] = Voxel::new(BlockType::Planks);

        persistence.persist(ChunkCoord::new(0, 0), &voxels).unwrap();
        persistence.persist(ChunkCoord::new(1, 0), &voxels).unwrap();
        assert!(persistence.try_load(ChunkCoord::new(0, 0)).unwrap().is_some());
        persistence.persist(ChunkCoord::new(2, 0), &voxels).unwrap();

        assert_eq!(persistence.len(), 2);
        assert!(persistence.contains(ChunkCoord::new(0, 0)));
        assert!(!persistence.contains(ChunkCoord::new(1, 0)));
        let loaded = persistence.try_load(ChunkCoord::new(2, 0)).unwrap().unwrap();
        assert_eq!(loaded[7].block_type(), BlockType::Planks);
        assert!(persistence.try_load(ChunkCoord::new(9, 9)).unwrap().is_none());
    }

    #[test]
    fn rejects_partial_arrays() {
        let persistence = MemoryPersistence::new(4);
        assert!(persistence.persist(ChunkCoord::new(0, 0), &[Voxel::AIR; 3]).is_err());
        assert!(persistence.is_empty());
    }
}
