//! Read-only voxel occupancy queries for collision and physics.
//!
//! Absent chunks read as Air, so a body outside the loaded region falls freely rather than
//! erroring. Callers that need to distinguish "empty" from "not loaded" can ask
//! [`OccupancyQuery::is_loaded`].

use cgmath::Point3;

use crate::world::block::{BlockType, Voxel};
use crate::world::chunk::{ChunkCoord, CHUNK_HEIGHT};
use crate::world::store::ChunkStore;

/// Borrowing view over a [`ChunkStore`] exposing only reads.
#[derive(Clone, Copy)]
pub struct OccupancyQuery<'a> {
    store: &'a ChunkStore,
}

impl<'a> OccupancyQuery<'a> {
    /// Wraps a store.
    pub fn new(store: &'a ChunkStore) -> Self {
        Self { store }
    }

    /// Voxel at a world position.
    pub fn voxel(&self, pos: Point3<i32>) -> Voxel {
        self.store.voxel(pos)
    }

    /// Block type at a world position.
    pub fn block_type(&self, pos: Point3<i32>) -> BlockType {
        self.voxel(pos).block_type()
    }

    /// `true` if collision treats the cell as occupied.
    pub fn is_solid(&self, pos: Point3<i32>) -> bool {
        self.voxel(pos).is_solid()
    }

    /// `true` if the chunk containing `pos` is resident.
    pub fn is_loaded(&self, pos: Point3<i32>) -> bool {
        self.store.contains(ChunkCoord::from_world(pos))
    }

    /// `true` if any cell in the inclusive box `[min, max]` is solid.
    pub fn any_solid_in_box(&self, min: Point3<i32>, max: Point3<i32>) -> bool {
        let y_min = min.y.max(0);
        let y_max = max.y.min(CHUNK_HEIGHT as i32 - 1);
        (min.x..=max.x).any(|x| {
            (min.z..=max.z).any(|z| (y_min..=y_max).any(|y| self.is_solid(Point3::new(x, y, z))))
        })
    }

    /// Highest solid y in the column at world `(x, z)`, if any.
    pub fn surface_height(&self, x: i32, z: i32) -> Option<i32> {
        (0..CHUNK_HEIGHT as i32)
            .rev()
            .find(|&y| self.is_solid(Point3::new(x, y, z)))
    }
}
