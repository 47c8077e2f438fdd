//! # Block Module
//!
//! Block types, block faces and the packed [`Voxel`] value stored in chunk arrays.
//!
//! Block behavior is a table lookup by type tag ([`BLOCK_PROPERTIES`]); nothing about a block
//! is dispatched dynamically.

pub mod block_side;
pub mod block_type;

pub use block_side::BlockSide;
pub use block_type::{BlockProperties, BlockType, Opacity, BLOCK_PROPERTIES};

use crate::error::{VoxelError, VoxelResult};

/// A single cell of the world.
///
/// # Memory Layout
/// One `u16`: the low byte is the [`BlockType`] tag, the high byte is free-form metadata
/// (orientation, light). The zero value is Air with no metadata, so `bytemuck::Zeroable`
/// produces an empty chunk.
///
/// A `Voxel` can only be built from a valid tag, so [`Voxel::block_type`] never fails.
#[repr(transparent)]
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Voxel(u16);

impl Voxel {
    /// Empty space.
    pub const AIR: Voxel = Voxel(0);

    /// A voxel of the given type with no metadata.
    #[inline]
    pub const fn new(block_type: BlockType) -> Self {
        Voxel(block_type as u16)
    }

    /// A voxel of the given type carrying a metadata byte.
    #[inline]
    pub const fn with_metadata(block_type: BlockType, metadata: u8) -> Self {
        Voxel(block_type as u16 | (metadata as u16) << 8)
    }

    /// Decodes a raw packed value, rejecting unknown type tags.
    pub fn from_raw(raw: u16) -> VoxelResult<Self> {
        let tag = (raw & 0xFF) as u8;
        match BlockType::from_tag(tag) {
            Some(_) => Ok(Voxel(raw)),
            None => Err(VoxelError::CorruptData(format!("unknown block tag {tag}"))),
        }
    }

    /// The packed value.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The block type tag.
    #[inline]
    pub fn block_type(self) -> BlockType {
        BlockType::from_tag((self.0 & 0xFF) as u8).unwrap_or(BlockType::Air)
    }

    /// The metadata byte.
    #[inline]
    pub const fn metadata(self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// `true` for Air regardless of metadata.
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 & 0xFF == 0
    }

    /// Culling class of the voxel's type.
    #[inline]
    pub fn opacity(self) -> Opacity {
        self.block_type().opacity()
    }

    /// Whether collision treats this voxel as occupied.
    #[inline]
    pub fn is_solid(self) -> bool {
        self.block_type().is_solid()
    }
}

impl From<BlockType> for Voxel {
    fn from(block_type: BlockType) -> Self {
        Voxel::new(block_type)
    }
}

impl std::fmt::Debug for Voxel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.metadata() == 0 {
            write!(f, "Voxel({:?})", self.block_type())
        } else {
            write!(f, "Voxel({:?}, meta={})", self.block_type(), self.metadata())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn air_is_zero() {
        assert_eq!(Voxel::AIR.raw(), 0);
        assert_eq!(Voxel::default(), Voxel::AIR);
        assert_eq!(<Voxel as bytemuck::Zeroable>::zeroed(), Voxel::AIR);
        assert!(Voxel::with_metadata(BlockType::Air, 9).is_air());
    }

    #[test]
    fn metadata_does_not_change_type() {
        let voxel = Voxel::with_metadata(BlockType::Glass, 0xAB);
        assert_eq!(voxel.block_type(), BlockType::Glass);
        assert_eq!(voxel.metadata(), 0xAB);
        assert_eq!(voxel.opacity(), Opacity::Transparent);
        assert_eq!(Voxel::from_raw(voxel.raw()).unwrap(), voxel);
    }

    #[test]
    fn rejects_unknown_tags() {
        assert!(matches!(Voxel::from_raw(0x00FF), Err(VoxelError::CorruptData(_))));
    }
}
