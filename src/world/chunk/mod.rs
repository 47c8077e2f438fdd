//! # Chunk Module
//!
//! A `Chunk` is a 16 x 256 x 16 column of voxels identified by a [`ChunkCoord`].
//!
//! ## Memory Layout
//! Voxels are stored densely, one `u16` each, in a boxed slice of `CHUNK_VOLUME` entries indexed
//! by `x + W * (z + D * y)`. The array is allocated in full when the chunk is created and never
//! resized, so a chunk handed out by the store is always complete.
//!
//! ## Lifecycle Flags
//! - `generated`: terrain (or persisted data) has been installed
//! - `dirty`: the cached mesh no longer matches the voxels or a neighbor's boundary
//! - `modified`: voxels were edited since they were installed and need persisting on eviction
//! - `revision`: bumped on every change that invalidates a mesh, so a mesh built from an older
//!   snapshot never clears the dirty flag

use std::sync::Arc;

use crate::error::{VoxelError, VoxelResult};
use crate::meshing::MeshData;
use crate::world::block::Voxel;

mod chunk_coord;

pub use chunk_coord::{ChunkCoord, LocalPos, MAX_OBSERVER_CHUNK};

/// Chunk extent along x.
pub const CHUNK_WIDTH: usize = 16;
/// Chunk extent along y; also the vertical extent of the world.
pub const CHUNK_HEIGHT: usize = 256;
/// Chunk extent along z.
pub const CHUNK_DEPTH: usize = 16;
/// Voxels in one horizontal layer.
pub const CHUNK_LAYER_SIZE: usize = CHUNK_WIDTH * CHUNK_DEPTH;
/// Voxels in a chunk.
pub const CHUNK_VOLUME: usize = CHUNK_LAYER_SIZE * CHUNK_HEIGHT;

/// Allocates a zeroed (all-Air) voxel array, reporting allocation failure instead of aborting.
pub fn allocate_voxels() -> VoxelResult<Box<[Voxel]>> {
    let mut voxels = Vec::new();
    voxels.try_reserve_exact(CHUNK_VOLUME).map_err(|err| {
        VoxelError::ResourceExhausted(format!("chunk voxel array: {err}"))
    })?;
    voxels.resize(CHUNK_VOLUME, Voxel::AIR);
    Ok(voxels.into_boxed_slice())
}

/// One column of voxel data plus its mesh cache.
pub struct Chunk {
    coord: ChunkCoord,
    voxels: Box<[Voxel]>,
    generated: bool,
    dirty: bool,
    modified: bool,
    revision: u64,
    mesh: Option<Arc<MeshData>>,
    mesh_pending: bool,
}

impl Chunk {
    /// Creates an all-Air, ungenerated chunk.
    pub fn new(coord: ChunkCoord) -> VoxelResult<Self> {
        Ok(Self {
            coord,
            voxels: allocate_voxels()?,
            generated: false,
            dirty: true,
            modified: false,
            revision: 0,
            mesh: None,
            mesh_pending: false,
        })
    }

    /// Position of this chunk in the chunk grid.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// The full voxel array in index order.
    pub fn voxels(&self) -> &[Voxel] {
        &self.voxels
    }

    /// Voxel at a local position.
    #[inline]
    pub fn voxel(&self, local: LocalPos) -> Voxel {
        self.voxels[local.index()]
    }

    /// Writes a voxel. Returns `false` (and leaves the flags untouched) when the value is
    /// unchanged.
    pub fn set_voxel(&mut self, local: LocalPos, voxel: Voxel) -> bool {
        let slot = &mut self.voxels[local.index()];
        if *slot == voxel {
            return false;
        }
        *slot = voxel;
        self.modified = true;
        self.mark_dirty();
        true
    }

    /// Replaces the voxel array with generated or loaded data and marks the chunk generated.
    ///
    /// # Errors
    /// `InvalidState` if `voxels` does not hold exactly `CHUNK_VOLUME` entries.
    pub fn install_voxels(&mut self, voxels: Box<[Voxel]>) -> VoxelResult<()> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(VoxelError::InvalidState(format!(
                "chunk {} expected {} voxels, got {}",
                self.coord,
                CHUNK_VOLUME,
                voxels.len()
            )));
        }
        self.voxels = voxels;
        self.generated = true;
        self.modified = false;
        self.mark_dirty();
        Ok(())
    }

    /// Terrain or persisted data has been installed.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Mesh is out of date.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Voxels were edited after installation.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Change counter used to detect meshes built from stale snapshots.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Marks the terrain as stale so it gets regenerated. The current voxels and mesh stay
    /// readable until replacements are installed; edits are refused meanwhile.
    pub fn invalidate_terrain(&mut self) {
        self.generated = false;
        self.modified = false;
        self.mark_dirty();
    }

    /// Flags the mesh as out of date.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision += 1;
    }

    /// Stores a freshly built mesh. The dirty flag is cleared only if no change happened
    /// since the snapshot at `built_from_revision` was taken.
    pub fn install_mesh(&mut self, mesh: Arc<MeshData>, built_from_revision: u64) {
        self.mesh = Some(mesh);
        self.mesh_pending = true;
        if self.revision == built_from_revision {
            self.dirty = false;
        }
    }

    /// Cached mesh, if one has been built.
    pub fn mesh(&self) -> Option<&Arc<MeshData>> {
        self.mesh.as_ref()
    }

    /// A mesh was installed that the renderer has not taken yet.
    pub fn has_pending_mesh(&self) -> bool {
        self.mesh_pending
    }

    /// Hands the cached mesh to the renderer and clears the pending flag. The chunk keeps its
    /// own reference until the next rebuild or eviction.
    pub fn take_mesh(&mut self) -> Option<Arc<MeshData>> {
        if !self.mesh_pending {
            return None;
        }
        self.mesh_pending = false;
        self.mesh.clone()
    }

    /// Highest non-Air y in a column, if any.
    pub fn column_height(&self, x: usize, z: usize) -> Option<usize> {
        (0..CHUNK_HEIGHT)
            .rev()
            .find(|&y| LocalPos::new(x, y, z).is_some_and(|local| !self.voxel(local).is_air()))
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("generated", &self.generated)
            .field("dirty", &self.dirty)
            .field("modified", &self.modified)
            .field("revision", &self.revision)
            .field("has_mesh", &self.mesh.is_some())
            .finish()
    }
}
