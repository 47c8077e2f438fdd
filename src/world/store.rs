//! # Chunk Store
//!
//! Sole owner of resident chunk memory, keyed by [`ChunkCoord`].
//!
//! ## Architecture
//!
//! Each chunk lives behind its own [`MtResource`], so locking is per chunk: a worker reading one
//! chunk never blocks edits to another. Lookups return handles, never references into the map.
//! Erasing a chunk removes it from lookup first; a worker that cloned the handle earlier keeps a
//! valid (now detached) chunk until it drops the handle, and nothing it produces is written back
//! because results are matched by coordinate and ticket on the update thread.
//!
//! All voxel edits go through [`ChunkStore::set_voxel`] so neighbor dirty propagation cannot be
//! skipped.

use std::collections::HashMap;

use cgmath::Point3;
use log::trace;

use crate::core::MtResource;
use crate::error::{VoxelError, VoxelResult};
use crate::world::block::Voxel;
use crate::world::chunk::{Chunk, ChunkCoord, LocalPos};

/// Mapping from chunk coordinate to the single chunk instance at that coordinate.
#[derive(Default)]
pub struct ChunkStore {
    chunks: HashMap<ChunkCoord, MtResource<Chunk>>,
}

impl ChunkStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chunk at `coord`, allocating an all-Air ungenerated chunk if none exists.
    ///
    /// # Errors
    /// `ResourceExhausted` if the voxel array cannot be allocated.
    pub fn get_or_create(&mut self, coord: ChunkCoord) -> VoxelResult<MtResource<Chunk>> {
        if let Some(chunk) = self.chunks.get(&coord) {
            return Ok(chunk.clone());
        }
        let chunk = MtResource::new(Chunk::new(coord)?);
        trace!("Allocated chunk {coord}");
        self.chunks.insert(coord, chunk.clone());
        Ok(chunk)
    }

    /// Non-allocating lookup.
    pub fn try_get(&self, coord: ChunkCoord) -> Option<&MtResource<Chunk>> {
        self.chunks.get(&coord)
    }

    /// `true` if a chunk is resident at `coord`.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Removes the chunk from lookup and returns its handle. The memory is freed once the last
    /// handle is dropped.
    pub fn erase(&mut self, coord: ChunkCoord) -> Option<MtResource<Chunk>> {
        let removed = self.chunks.remove(&coord);
        if removed.is_some() {
            trace!("Erased chunk {coord}");
        }
        removed
    }

    /// Number of resident chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// `true` when no chunk is resident.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Coordinates of all resident chunks, in arbitrary order.
    pub fn coords(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        self.chunks.keys().copied()
    }

    /// Voxel at a world position. Absent chunks and positions outside the vertical range read
    /// as Air.
    pub fn voxel(&self, pos: Point3<i32>) -> Voxel {
        let Some(local) = LocalPos::from_world(pos) else {
            return Voxel::AIR;
        };
        self.chunks
            .get(&ChunkCoord::from_world(pos))
            .map_or(Voxel::AIR, |chunk| chunk.get().voxel(local))
    }

    /// Writes a voxel at a world position, marking the owning chunk dirty and every resident
    /// neighbor whose shared face contains the position.
    ///
    /// # Errors
    /// - `OutOfBounds` if y is outside the world's vertical range
    /// - `InvalidState` if the owning chunk is not resident or has no terrain yet
    pub fn set_voxel(&mut self, pos: Point3<i32>, voxel: Voxel) -> VoxelResult<()> {
        let local = LocalPos::from_world(pos).ok_or(VoxelError::OutOfBounds {
            x: pos.x,
            y: pos.y,
            z: pos.z,
        })?;
        let coord = ChunkCoord::from_world(pos);
        let chunk = self.chunks.get(&coord).ok_or_else(|| {
            VoxelError::InvalidState(format!("set_voxel on non-resident chunk {coord}"))
        })?;

        let changed = {
            let mut chunk = chunk.get_mut();
            if !chunk.is_generated() {
                return Err(VoxelError::InvalidState(format!(
                    "set_voxel on chunk {coord} before its terrain was installed"
                )));
            }
            chunk.set_voxel(local, voxel)
        };

        if changed {
            for (dx, dz) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                if local.on_boundary(dx, dz) {
                    self.mark_dirty(coord.offset(dx, dz));
                }
            }
        }
        Ok(())
    }

    /// Installs generated or loaded voxels into a resident chunk and marks its generated
    /// neighbors dirty, since their boundary faces depend on this chunk.
    ///
    /// # Errors
    /// `InvalidState` if the chunk is not resident or the payload has the wrong size.
    pub fn install_voxels(&mut self, coord: ChunkCoord, voxels: Box<[Voxel]>) -> VoxelResult<()> {
        let chunk = self.chunks.get(&coord).ok_or_else(|| {
            VoxelError::InvalidState(format!("install into non-resident chunk {coord}"))
        })?;
        chunk.get_mut().install_voxels(voxels)?;

        for neighbor in coord.neighbors() {
            if let Some(neighbor) = self.chunks.get(&neighbor) {
                let mut neighbor = neighbor.get_mut();
                if neighbor.is_generated() {
                    neighbor.mark_dirty();
                }
            }
        }
        Ok(())
    }

    /// Flags a resident chunk's mesh as out of date. Absent chunks are ignored.
    pub fn mark_dirty(&self, coord: ChunkCoord) {
        if let Some(chunk) = self.chunks.get(&coord) {
            chunk.get_mut().mark_dirty();
        }
    }

    /// Drops every chunk.
    pub fn clear(&mut self) {
        self.chunks.clear();
    }
}
