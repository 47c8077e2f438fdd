//! Mesh output of a single chunk.

use cgmath::Point3;

use crate::error::{VoxelError, VoxelResult};
use crate::meshing::{Face, Vertex};
use crate::world::chunk::ChunkCoord;

/// Vertex and index buffers for one chunk, partitioned into an opaque range followed by a
/// transparent range.
///
/// Vertex positions are chunk-local; add [`MeshData::origin`] to place them in the world.
/// Indices address the shared vertex list, so both ranges can be drawn from one vertex buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    coord: ChunkCoord,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    opaque_index_count: usize,
    opaque_faces: usize,
    transparent_faces: usize,
}

impl MeshData {
    /// A mesh with no geometry.
    pub fn empty(coord: ChunkCoord) -> Self {
        Self {
            coord,
            vertices: Vec::new(),
            indices: Vec::new(),
            opaque_index_count: 0,
            opaque_faces: 0,
            transparent_faces: 0,
        }
    }

    /// Builds the buffers from merged faces.
    ///
    /// # Errors
    /// `ResourceExhausted` if the buffers cannot be allocated.
    pub fn from_faces(coord: ChunkCoord, opaque: &[Face], transparent: &[Face]) -> VoxelResult<Self> {
        let face_count = opaque.len() + transparent.len();
        if face_count * 4 > u32::MAX as usize {
            return Err(VoxelError::ResourceExhausted(format!(
                "chunk {coord} mesh has {face_count} faces"
            )));
        }

        let mut mesh = Self::empty(coord);
        mesh.vertices.try_reserve_exact(face_count * 4).map_err(|err| {
            VoxelError::ResourceExhausted(format!("vertex buffer for chunk {coord}: {err}"))
        })?;
        mesh.indices.try_reserve_exact(face_count * 6).map_err(|err| {
            VoxelError::ResourceExhausted(format!("index buffer for chunk {coord}: {err}"))
        })?;

        for face in opaque {
            mesh.push_face(face);
        }
        mesh.opaque_index_count = mesh.indices.len();
        mesh.opaque_faces = opaque.len();

        for face in transparent {
            mesh.push_face(face);
        }
        mesh.transparent_faces = transparent.len();

        Ok(mesh)
    }

    fn push_face(&mut self, face: &Face) {
        let first_vertex = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&face.vertices());
        self.indices.extend_from_slice(&Face::indices(first_vertex));
    }

    /// Chunk the mesh belongs to.
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// World position that vertex positions are relative to.
    pub fn origin(&self) -> Point3<i32> {
        self.coord.origin()
    }

    /// All vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All indices, opaque range first.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Indices of opaque geometry.
    pub fn opaque_indices(&self) -> &[u32] {
        &self.indices[..self.opaque_index_count]
    }

    /// Indices of transparent geometry.
    pub fn transparent_indices(&self) -> &[u32] {
        &self.indices[self.opaque_index_count..]
    }

    /// Quads in the opaque range.
    pub fn opaque_face_count(&self) -> usize {
        self.opaque_faces
    }

    /// Quads in the transparent range.
    pub fn transparent_face_count(&self) -> usize {
        self.transparent_faces
    }

    /// Total quads.
    pub fn face_count(&self) -> usize {
        self.opaque_faces + self.transparent_faces
    }

    /// `true` when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}
