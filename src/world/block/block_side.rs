//! # Block Side Module
//!
//! The six axis-aligned faces of a voxel, in the order +X, -X, +Y, -Y, +Z, -Z.

use cgmath::Vector3;

/// One face direction of a voxel.
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// +X
    Right = 0,
    /// -X
    Left = 1,
    /// +Y
    Top = 2,
    /// -Y
    Bottom = 3,
    /// +Z
    Front = 4,
    /// -Z
    Back = 5,
}

impl BlockSide {
    /// All six sides, in discriminant order.
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::Right,
            BlockSide::Left,
            BlockSide::Top,
            BlockSide::Bottom,
            BlockSide::Front,
            BlockSide::Back,
        ]
    }

    /// Axis the face is perpendicular to: 0 = x, 1 = y, 2 = z.
    #[inline]
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// `true` if the face normal points along the positive axis.
    #[inline]
    pub fn is_positive(self) -> bool {
        self as usize % 2 == 0
    }

    /// The face on the opposite side of the voxel.
    pub fn opposite(self) -> BlockSide {
        match self {
            BlockSide::Right => BlockSide::Left,
            BlockSide::Left => BlockSide::Right,
            BlockSide::Top => BlockSide::Bottom,
            BlockSide::Bottom => BlockSide::Top,
            BlockSide::Front => BlockSide::Back,
            BlockSide::Back => BlockSide::Front,
        }
    }

    /// Integer step to the neighboring cell this face looks at.
    pub fn offset(self) -> Vector3<i32> {
        let mut offset = [0; 3];
        offset[self.axis()] = if self.is_positive() { 1 } else { -1 };
        Vector3::from(offset)
    }

    /// Unit normal of the face.
    pub fn normal(self) -> Vector3<f32> {
        self.offset().cast::<f32>().unwrap_or(Vector3::new(0.0, 0.0, 0.0))
    }
}
