//! Lock-free input for the mesher.
//!
//! A `ChunkNeighborhood` copies the center chunk's voxels and the single boundary layer of each
//! horizontal neighbor that faces it. Each copy holds one chunk's read lock only for the copy, so
//! the mesher itself never holds a lock and never observes a neighbor that is mid-eviction.

use crate::core::MtResource;
use crate::error::{VoxelError, VoxelResult};
use crate::world::block::Voxel;
use crate::world::chunk::{
    Chunk, ChunkCoord, LocalPos, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_LAYER_SIZE, CHUNK_VOLUME,
    CHUNK_WIDTH,
};

/// Horizontal neighbor slots, matching [`ChunkCoord::neighbors`]: +x, -x, +z, -z.
const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Snapshot of a chunk and the faces of its neighbors that touch it.
pub struct ChunkNeighborhood {
    coord: ChunkCoord,
    revision: u64,
    center: Box<[Voxel]>,
    /// One above the highest non-Air layer of the center chunk.
    height_bound: usize,
    /// Boundary layer of each neighbor, indexed `along + y * extent`, where `along` runs over the
    /// neighbor's shared face (z for x-neighbors, x for z-neighbors). `None` reads as Air.
    boundaries: [Option<Vec<Voxel>>; 4],
}

impl ChunkNeighborhood {
    /// Copies a chunk and whichever of its four neighbors are resident and generated.
    pub fn capture(
        center: &MtResource<Chunk>,
        neighbors: [Option<MtResource<Chunk>>; 4],
    ) -> VoxelResult<Self> {
        let (coord, revision, voxels) = {
            let chunk = center.get();
            (chunk.coord(), chunk.revision(), chunk.voxels().to_vec())
        };

        let boundaries = std::array::from_fn(|slot| {
            neighbors[slot].as_ref().and_then(|neighbor| {
                let neighbor = neighbor.get();
                if neighbor.is_generated() {
                    Some(copy_boundary(neighbor.voxels(), NEIGHBOR_OFFSETS[slot]))
                } else {
                    None
                }
            })
        });

        Self::from_parts(coord, revision, voxels.into_boxed_slice(), boundaries)
    }

    /// Builds a neighborhood from raw arrays. Each present neighbor must be a full chunk array.
    pub fn from_voxels(
        coord: ChunkCoord,
        center: Box<[Voxel]>,
        neighbors: [Option<&[Voxel]>; 4],
    ) -> VoxelResult<Self> {
        for neighbor in neighbors.iter().flatten() {
            check_len(coord, neighbor.len())?;
        }
        let boundaries = std::array::from_fn(|slot| {
            neighbors[slot].map(|voxels| copy_boundary(voxels, NEIGHBOR_OFFSETS[slot]))
        });
        Self::from_parts(coord, 0, center, boundaries)
    }

    fn from_parts(
        coord: ChunkCoord,
        revision: u64,
        center: Box<[Voxel]>,
        boundaries: [Option<Vec<Voxel>>; 4],
    ) -> VoxelResult<Self> {
        check_len(coord, center.len())?;
        let height_bound = center
            .iter()
            .rposition(|voxel| !voxel.is_air())
            .map_or(0, |index| index / CHUNK_LAYER_SIZE + 1);
        Ok(Self {
            coord,
            revision,
            center,
            height_bound,
            boundaries,
        })
    }

    /// Chunk being meshed.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Revision of the center chunk when it was copied.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Layers at or above this index are all Air in the center chunk, so they cannot emit faces.
    pub fn height_bound(&self) -> usize {
        self.height_bound
    }

    /// Voxel at a chunk-local position that may be one step outside the chunk horizontally
    /// or any distance outside vertically. Cells outside the world or in a missing neighbor are
    /// Air.
    pub fn voxel(&self, x: i32, y: i32, z: i32) -> Voxel {
        if y < 0 || y >= CHUNK_HEIGHT as i32 {
            return Voxel::AIR;
        }
        let (w, d) = (CHUNK_WIDTH as i32, CHUNK_DEPTH as i32);
        let inside_x = (0..w).contains(&x);
        let inside_z = (0..d).contains(&z);
        let y = y as usize;

        match (inside_x, inside_z) {
            (true, true) => LocalPos::new(x as usize, y, z as usize)
                .map_or(Voxel::AIR, |local| self.center[local.index()]),
            (false, true) if x == w => self.boundary(0, z as usize, y, CHUNK_DEPTH),
            (false, true) if x == -1 => self.boundary(1, z as usize, y, CHUNK_DEPTH),
            (true, false) if z == d => self.boundary(2, x as usize, y, CHUNK_WIDTH),
            (true, false) if z == -1 => self.boundary(3, x as usize, y, CHUNK_WIDTH),
            _ => Voxel::AIR,
        }
    }

    fn boundary(&self, slot: usize, along: usize, y: usize, extent: usize) -> Voxel {
        self.boundaries[slot]
            .as_ref()
            .and_then(|layer| layer.get(along + y * extent).copied())
            .unwrap_or(Voxel::AIR)
    }
}

fn check_len(coord: ChunkCoord, len: usize) -> VoxelResult<()> {
    if len == CHUNK_VOLUME {
        Ok(())
    } else {
        Err(VoxelError::InvalidState(format!(
            "chunk {coord} neighborhood given {len} voxels"
        )))
    }
}

/// Copies the layer of a neighbor's voxels that faces back toward the chunk at `-offset`.
fn copy_boundary(voxels: &[Voxel], (dx, dz): (i32, i32)) -> Vec<Voxel> {
    let read = |x: usize, y: usize, z: usize| {
        LocalPos::new(x, y, z)
            .and_then(|local| voxels.get(local.index()).copied())
            .unwrap_or(Voxel::AIR)
    };
    let mut layer = Vec::with_capacity(CHUNK_HEIGHT * CHUNK_WIDTH.max(CHUNK_DEPTH));
    for y in 0..CHUNK_HEIGHT {
        match (dx, dz) {
            (1, _) => layer.extend((0..CHUNK_DEPTH).map(|z| read(0, y, z))),
            (-1, _) => layer.extend((0..CHUNK_DEPTH).map(|z| read(CHUNK_WIDTH - 1, y, z))),
            (_, 1) => layer.extend((0..CHUNK_WIDTH).map(|x| read(x, y, 0))),
            _ => layer.extend((0..CHUNK_WIDTH).map(|x| read(x, y, CHUNK_DEPTH - 1))),
        }
    }
    layer
}
