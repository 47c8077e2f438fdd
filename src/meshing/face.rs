//! A merged, axis-aligned quad produced by the greedy mesher.

use cgmath::Point3;

use crate::meshing::Vertex;
use crate::world::block::{BlockSide, BlockType};

/// Rectangle of coplanar faces sharing one block type and orientation.
///
/// `cell` is the voxel at the quad's minimum corner. The quad extends `width` voxels along the
/// first in-plane axis and `height` along the second, where for a face on axis `a` the in-plane
/// axes are `(a + 1) % 3` and `(a + 2) % 3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// Direction the quad faces.
    pub side: BlockSide,
    /// Block type of every merged voxel face.
    pub block_type: BlockType,
    /// Chunk-local minimum voxel.
    pub cell: Point3<usize>,
    /// Extent along the first in-plane axis.
    pub width: usize,
    /// Extent along the second in-plane axis.
    pub height: usize,
}

impl Face {
    /// In-plane axes for a face on `axis`.
    #[inline]
    pub fn plane_axes(axis: usize) -> (usize, usize) {
        ((axis + 1) % 3, (axis + 2) % 3)
    }

    /// Number of unit voxel faces covered by this quad.
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Corner positions, counter-clockwise when seen from the side the normal points to.
    pub fn corners(&self) -> [Point3<f32>; 4] {
        let axis = self.side.axis();
        let (u, v) = Self::plane_axes(axis);

        let mut base = [self.cell.x as f32, self.cell.y as f32, self.cell.z as f32];
        if self.side.is_positive() {
            base[axis] += 1.0;
        }
        let mut du = [0.0; 3];
        du[u] = self.width as f32;
        let mut dv = [0.0; 3];
        dv[v] = self.height as f32;

        let at = |su: f32, sv: f32| {
            Point3::new(
                base[0] + du[0] * su + dv[0] * sv,
                base[1] + du[1] * su + dv[1] * sv,
                base[2] + du[2] * su + dv[2] * sv,
            )
        };

        if self.side.is_positive() {
            [at(0.0, 0.0), at(1.0, 0.0), at(1.0, 1.0), at(0.0, 1.0)]
        } else {
            [at(0.0, 0.0), at(0.0, 1.0), at(1.0, 1.0), at(1.0, 0.0)]
        }
    }

    /// The four vertices of the quad, in [`Face::corners`] order.
    pub fn vertices(&self) -> [Vertex; 4] {
        let (w, h) = (self.width as f32, self.height as f32);
        let uvs = if self.side.is_positive() {
            [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]]
        } else {
            [[0.0, 0.0], [0.0, h], [w, h], [w, 0.0]]
        };
        let normal = self.side.normal();
        let color = self.block_type.properties().color;
        let corners = self.corners();

        std::array::from_fn(|i| Vertex {
            position: [corners[i].x, corners[i].y, corners[i].z],
            normal: [normal.x, normal.y, normal.z],
            uv: uvs[i],
            color,
            block_type: self.block_type as u32,
        })
    }

    /// Two triangles over the quad's vertices starting at `first_vertex`.
    pub fn indices(first_vertex: u32) -> [u32; 6] {
        let s = first_vertex;
        [s, s + 1, s + 2, s, s + 2, s + 3]
    }
}
