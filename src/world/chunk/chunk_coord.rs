//! # Chunk Coordinates
//!
//! Mapping between world positions, chunk coordinates and local voxel positions.
//!
//! Horizontal mapping uses floor division (`div_euclid`) and `rem_euclid`, so world x = -1
//! lands in chunk -1 at local x = 15 rather than in chunk 0.

use std::fmt;

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use super::{CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME, CHUNK_WIDTH};

/// Largest chunk index an observer is clamped to. Leaves room for the widest footprint so every
/// streamed chunk's origin fits in an `i32`.
pub const MAX_OBSERVER_CHUNK: i32 = i32::MAX / CHUNK_WIDTH as i32 - 256;

/// Integer position of a chunk column in the infinite horizontal grid.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    /// Chunk index along world x.
    pub x: i32,
    /// Chunk index along world z.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Chunk containing the world position. The y component is ignored.
    pub fn from_world(pos: Point3<i32>) -> Self {
        Self {
            x: pos.x.div_euclid(CHUNK_WIDTH as i32),
            z: pos.z.div_euclid(CHUNK_DEPTH as i32),
        }
    }

    /// Chunk containing a floating point position, e.g. an observer.
    pub fn from_world_f32(pos: Point3<f32>) -> Self {
        Self::from_world(Point3::new(
            pos.x.floor() as i32,
            pos.y.floor() as i32,
            pos.z.floor() as i32,
        ))
    }

    /// Both indices clamped to `-MAX_OBSERVER_CHUNK..=MAX_OBSERVER_CHUNK`.
    pub fn clamped_to_world(self) -> Self {
        Self {
            x: self.x.clamp(-MAX_OBSERVER_CHUNK, MAX_OBSERVER_CHUNK),
            z: self.z.clamp(-MAX_OBSERVER_CHUNK, MAX_OBSERVER_CHUNK),
        }
    }

    /// World position of local (0, 0, 0).
    pub fn origin(self) -> Point3<i32> {
        Point3::new(self.x * CHUNK_WIDTH as i32, 0, self.z * CHUNK_DEPTH as i32)
    }

    /// Horizontal center of the chunk at height `y`, e.g. to place an observer.
    pub fn center(self, y: f32) -> Point3<f32> {
        let origin = self.origin();
        Point3::new(
            origin.x as f32 + CHUNK_WIDTH as f32 / 2.0,
            y,
            origin.z as f32 + CHUNK_DEPTH as f32 / 2.0,
        )
    }

    /// World position of a local voxel in this chunk.
    pub fn world_pos(self, local: LocalPos) -> Point3<i32> {
        let origin = self.origin();
        Point3::new(
            origin.x + local.x as i32,
            local.y as i32,
            origin.z + local.z as i32,
        )
    }

    /// Coordinate displaced by `(dx, dz)` chunks.
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// The four chunks sharing a vertical face with this one: +x, -x, +z, -z.
    pub const fn neighbors(self) -> [ChunkCoord; 4] {
        [
            self.offset(1, 0),
            self.offset(-1, 0),
            self.offset(0, 1),
            self.offset(0, -1),
        ]
    }

    /// Squared Euclidean distance in chunk units.
    pub fn distance_squared(self, other: ChunkCoord) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dz = self.z as i64 - other.z as i64;
        dx * dx + dz * dz
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Position of a voxel inside its chunk.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalPos {
    /// 0..CHUNK_WIDTH
    pub x: usize,
    /// 0..CHUNK_HEIGHT
    pub y: usize,
    /// 0..CHUNK_DEPTH
    pub z: usize,
}

impl LocalPos {
    /// Creates a local position, returning `None` if any component is out of range.
    pub fn new(x: usize, y: usize, z: usize) -> Option<Self> {
        (x < CHUNK_WIDTH && y < CHUNK_HEIGHT && z < CHUNK_DEPTH).then_some(Self { x, y, z })
    }

    /// Local position of a world position inside its chunk. `None` when y is outside the
    /// vertical range of the world.
    pub fn from_world(pos: Point3<i32>) -> Option<Self> {
        if pos.y < 0 || pos.y >= CHUNK_HEIGHT as i32 {
            return None;
        }
        Some(Self {
            x: pos.x.rem_euclid(CHUNK_WIDTH as i32) as usize,
            y: pos.y as usize,
            z: pos.z.rem_euclid(CHUNK_DEPTH as i32) as usize,
        })
    }

    /// Index into a chunk's voxel array: `x + W * (z + D * y)`.
    #[inline]
    pub const fn index(self) -> usize {
        self.x + CHUNK_WIDTH * (self.z + CHUNK_DEPTH * self.y)
    }

    /// Inverse of [`LocalPos::index`].
    #[inline]
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= CHUNK_VOLUME {
            return None;
        }
        Some(Self {
            x: index % CHUNK_WIDTH,
            z: (index / CHUNK_WIDTH) % CHUNK_DEPTH,
            y: index / (CHUNK_WIDTH * CHUNK_DEPTH),
        })
    }

    /// `true` if the voxel lies on the chunk face shared with the given horizontal neighbor
    /// offset (`(1, 0)` is +x, `(0, -1)` is -z).
    pub fn on_boundary(self, dx: i32, dz: i32) -> bool {
        (dx == 1 && self.x == CHUNK_WIDTH - 1)
            || (dx == -1 && self.x == 0)
            || (dz == 1 && self.z == CHUNK_DEPTH - 1)
            || (dz == -1 && self.z == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_positions_use_floor_division() {
        let pos = Point3::new(-1, 5, -17);
        assert_eq!(ChunkCoord::from_world(pos), ChunkCoord::new(-1, -2));
        let local = LocalPos::from_world(pos).unwrap();
        assert_eq!((local.x, local.y, local.z), (15, 5, 15));
    }

    #[test]
    fn world_round_trip() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..2000 {
            let pos = Point3::new(
                rng.i32(-100_000..100_000),
                rng.i32(0..CHUNK_HEIGHT as i32),
                rng.i32(-100_000..100_000),
            );
            let coord = ChunkCoord::from_world(pos);
            let local = LocalPos::from_world(pos).unwrap();
            let rebuilt = coord.world_pos(local);
            assert_eq!(rebuilt, pos);
            assert_eq!(ChunkCoord::from_world(rebuilt), coord);
            assert_eq!(LocalPos::from_index(local.index()), Some(local));
        }
    }

    #[test]
    fn center_maps_back_to_chunk() {
        for coord in [ChunkCoord::new(0, 0), ChunkCoord::new(-7, 3), ChunkCoord::new(20, -1)] {
            assert_eq!(ChunkCoord::from_world_f32(coord.center(64.0)), coord);
        }
        assert_eq!(ChunkCoord::new(0, 0).distance_squared(ChunkCoord::new(-3, 4)), 25);
    }

    #[test]
    fn extreme_positions_clamp_to_a_safe_range() {
        let far = ChunkCoord::from_world_f32(Point3::new(f32::MAX, 0.0, f32::MIN)).clamped_to_world();
        assert_eq!(far, ChunkCoord::new(MAX_OBSERVER_CHUNK, -MAX_OBSERVER_CHUNK));

        let edge = far.offset(64, -64);
        let origin = edge.origin();
        assert!(origin.x > 0 && origin.z < 0);
        assert_eq!(ChunkCoord::from_world(origin), edge);
        assert_eq!(
            ChunkCoord::new(i32::MAX, 0).distance_squared(ChunkCoord::new(-1, 0)),
            1i64 << 62
        );
        assert_eq!(ChunkCoord::new(3, -4).clamped_to_world(), ChunkCoord::new(3, -4));
    }

    #[test]
    fn vertical_range_is_bounded() {
        assert!(LocalPos::from_world(Point3::new(0, -1, 0)).is_none());
        assert!(LocalPos::from_world(Point3::new(0, CHUNK_HEIGHT as i32, 0)).is_none());
        assert!(LocalPos::new(CHUNK_WIDTH, 0, 0).is_none());
        assert_eq!(LocalPos::from_index(CHUNK_VOLUME), None);
    }

    #[test]
    fn boundary_detection() {
        let corner = LocalPos::new(0, 10, CHUNK_DEPTH - 1).unwrap();
        assert!(corner.on_boundary(-1, 0));
        assert!(corner.on_boundary(0, 1));
        assert!(!corner.on_boundary(1, 0));
        assert!(!corner.on_boundary(0, -1));
    }
}
