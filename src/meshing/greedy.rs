//! Greedy meshing implementation.
//!
//! For each of the six face directions the chunk is swept slice by slice along that direction's
//! axis. Each slice produces a 2D mask holding the block type of every visible face, and the
//! mask is then covered with maximal rectangles of one block type: grow a run along the first
//! in-plane axis, then extend it along the second while every cell of the next row matches.

use bitvec::prelude::*;
use cgmath::Point3;
use log::debug;
use web_time::Instant;

use crate::error::VoxelResult;
use crate::meshing::{ChunkNeighborhood, Face, MeshData};
use crate::world::block::{BlockSide, BlockType, Opacity, Voxel};
use crate::world::chunk::{CHUNK_DEPTH, CHUNK_WIDTH};

/// Converts voxel data into culled, greedily merged geometry.
pub struct MeshBuilder;

impl MeshBuilder {
    /// Meshes a captured neighborhood.
    ///
    /// # Errors
    /// `ResourceExhausted` if the output buffers cannot be allocated. The caller keeps whatever
    /// mesh it had before.
    pub fn build(neighborhood: &ChunkNeighborhood) -> VoxelResult<MeshData> {
        let start = Instant::now();
        let mut opaque = Vec::new();
        let mut transparent = Vec::new();

        for side in BlockSide::all() {
            greedy_side(neighborhood, side, &mut opaque, &mut transparent);
        }

        let mesh = MeshData::from_faces(neighborhood.coord(), &opaque, &transparent)?;
        debug!(
            "Meshed chunk {} into {} opaque and {} transparent quads in {:?}",
            neighborhood.coord(),
            opaque.len(),
            transparent.len(),
            start.elapsed()
        );
        Ok(mesh)
    }
}

/// Whether the face of `voxel` toward `neighbor` is visible.
///
/// Air never emits. Anything emits against Air. An opaque voxel emits against a transparent
/// one; the reverse face is hidden behind the opaque block. Same-class pairs never emit.
#[inline]
pub fn face_visible(voxel: Voxel, neighbor: Voxel) -> bool {
    match (voxel.opacity(), neighbor.opacity()) {
        (Opacity::Empty, _) => false,
        (_, Opacity::Empty) => true,
        (Opacity::Opaque, Opacity::Transparent) => true,
        _ => false,
    }
}

fn greedy_side(
    neighborhood: &ChunkNeighborhood,
    side: BlockSide,
    opaque: &mut Vec<Face>,
    transparent: &mut Vec<Face>,
) {
    // Only voxels below the height bound can emit faces.
    let dims = [CHUNK_WIDTH, neighborhood.height_bound(), CHUNK_DEPTH];
    let axis = side.axis();
    let (u, v) = Face::plane_axes(axis);
    let (nu, nv) = (dims[u], dims[v]);
    if nu == 0 || nv == 0 || dims[axis] == 0 {
        return;
    }
    let step = if side.is_positive() { 1 } else { -1 };

    let mut mask: Vec<Option<BlockType>> = vec![None; nu * nv];
    let mut consumed = bitvec![0; nu * nv];

    for slice in 0..dims[axis] {
        let cell_at = |i: usize, j: usize| {
            let mut p = [0usize; 3];
            p[axis] = slice;
            p[u] = i;
            p[v] = j;
            p
        };

        for j in 0..nv {
            for i in 0..nu {
                let p = cell_at(i, j);
                let (x, y, z) = (p[0] as i32, p[1] as i32, p[2] as i32);
                let voxel = neighborhood.voxel(x, y, z);
                let mut q = [x, y, z];
                q[axis] += step;
                let neighbor = neighborhood.voxel(q[0], q[1], q[2]);
                mask[i + j * nu] = face_visible(voxel, neighbor).then(|| voxel.block_type());
            }
        }
        consumed.fill(false);

        for j in 0..nv {
            let mut i = 0;
            while i < nu {
                let index = i + j * nu;
                let Some(block_type) = mask[index].filter(|_| !consumed[index]) else {
                    i += 1;
                    continue;
                };
                let matches = |i: usize, j: usize| {
                    let index = i + j * nu;
                    mask[index] == Some(block_type) && !consumed[index]
                };

                let mut width = 1;
                while i + width < nu && matches(i + width, j) {
                    width += 1;
                }

                let mut height = 1;
                while j + height < nv && (i..i + width).all(|k| matches(k, j + height)) {
                    height += 1;
                }

                for dj in 0..height {
                    let row = (j + dj) * nu;
                    consumed[row + i..row + i + width].fill(true);
                }

                let p = cell_at(i, j);
                let face = Face {
                    side,
                    block_type,
                    cell: Point3::new(p[0], p[1], p[2]),
                    width,
                    height,
                };
                if block_type.is_transparent() {
                    transparent.push(face);
                } else {
                    opaque.push(face);
                }
                i += width;
            }
        }
    }
}
