//! # Meshing Module
//!
//! Turns chunk voxels into renderable geometry with face culling and greedy merging.
//!
//! ## Architecture
//! - `ChunkNeighborhood`: copy of a chunk plus its neighbors' touching layers, taken under short
//!   per-chunk read locks
//! - `MeshBuilder`: sweeps the six directions and merges visible faces into quads
//! - `Face`: one merged quad and its vertex generation
//! - `MeshData`: vertex/index buffers with opaque and transparent index ranges
//!
//! Neighbors are looked up by coordinate when the snapshot is taken; chunks never reference each
//! other.

mod face;
mod greedy;
mod mesh;
mod neighborhood;
mod vertex;

pub use face::Face;
pub use greedy::{face_visible, MeshBuilder};
pub use mesh::MeshData;
pub use neighborhood::ChunkNeighborhood;
pub use vertex::Vertex;
