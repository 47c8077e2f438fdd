//! # Block Type Module
//!
//! The closed set of block types and the static property table indexed by the type tag.

use std::fmt;

use num_derive::FromPrimitive;

/// Enumerates all possible block types in the voxel world.
///
/// The discriminant is the type tag stored in the low byte of a [`super::Voxel`]. `Air` is
/// zero so a zeroed voxel array is an empty chunk. The `FromPrimitive` derive allows decoding
/// tags read back from persistence.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, FromPrimitive)]
pub enum BlockType {
    /// Empty space.
    Air = 0,
    /// Bulk underground material.
    Stone,
    /// Sub-surface layer below grass and sand.
    Dirt,
    /// Surface block of high terrain.
    Grass,
    /// Surface block of mid terrain.
    Sand,
    /// Liquid; transparent and not solid.
    Water,
    /// Tree trunk.
    Wood,
    /// Tree canopy; transparent.
    Leaves,
    /// Indestructible world floor.
    Bedrock,
    /// Snow cover.
    Snow,
    /// Frozen water; transparent.
    Ice,
    /// Placed stone.
    Cobblestone,
    /// Placed wood.
    Planks,
    /// Placed glass; transparent.
    Glass,
}

/// How a block participates in face culling.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Opacity {
    /// Air. Never produces faces and never hides one.
    Empty,
    /// Hides every face behind it.
    Opaque,
    /// Drawn in the blended pass; hides only faces of other transparent blocks.
    Transparent,
}

/// Static per-type behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BlockProperties {
    /// Display name.
    pub name: &'static str,
    /// Base vertex color, RGBA.
    pub color: [u8; 4],
    /// Culling class.
    pub opacity: Opacity,
    /// Blocks movement for collision queries.
    pub solid: bool,
    /// Flows; never solid.
    pub liquid: bool,
}

const fn props(
    name: &'static str,
    color: [u8; 4],
    opacity: Opacity,
    solid: bool,
    liquid: bool,
) -> BlockProperties {
    BlockProperties {
        name,
        color,
        opacity,
        solid,
        liquid,
    }
}

/// Property table indexed by `BlockType as usize`.
pub static BLOCK_PROPERTIES: [BlockProperties; BlockType::COUNT] = [
    props("Air", [0, 0, 0, 0], Opacity::Empty, false, false),
    props("Stone", [128, 128, 128, 255], Opacity::Opaque, true, false),
    props("Dirt", [139, 69, 19, 255], Opacity::Opaque, true, false),
    props("Grass", [34, 139, 34, 255], Opacity::Opaque, true, false),
    props("Sand", [238, 214, 175, 255], Opacity::Opaque, true, false),
    props("Water", [30, 144, 255, 160], Opacity::Transparent, false, true),
    props("Wood", [139, 90, 43, 255], Opacity::Opaque, true, false),
    props("Leaves", [34, 139, 34, 220], Opacity::Transparent, true, false),
    props("Bedrock", [50, 50, 50, 255], Opacity::Opaque, true, false),
    props("Snow", [255, 250, 250, 255], Opacity::Opaque, true, false),
    props("Ice", [175, 225, 255, 200], Opacity::Transparent, true, false),
    props("Cobblestone", [110, 110, 110, 255], Opacity::Opaque, true, false),
    props("Planks", [186, 140, 90, 255], Opacity::Opaque, true, false),
    props("Glass", [200, 230, 255, 90], Opacity::Transparent, true, false),
];

impl BlockType {
    /// Number of block types.
    pub const COUNT: usize = 14;

    /// Decodes a type tag, returning `None` for unknown tags.
    pub fn from_tag(tag: u8) -> Option<Self> {
        num_traits::FromPrimitive::from_u8(tag)
    }

    /// Static properties of this type.
    #[inline]
    pub fn properties(self) -> &'static BlockProperties {
        &BLOCK_PROPERTIES[self as usize]
    }

    /// Culling class of this type.
    #[inline]
    pub fn opacity(self) -> Opacity {
        self.properties().opacity
    }

    /// `true` for every type that collision treats as occupied.
    #[inline]
    pub fn is_solid(self) -> bool {
        self.properties().solid
    }

    /// `true` for transparent types drawn in the blended pass.
    #[inline]
    pub fn is_transparent(self) -> bool {
        self.opacity() == Opacity::Transparent
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.properties().name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_tag() {
        for tag in 0..BlockType::COUNT as u8 {
            let block_type = BlockType::from_tag(tag).unwrap();
            assert_eq!(block_type as u8, tag);
            assert_eq!(block_type.to_string(), block_type.properties().name);
            assert_eq!(format!("{block_type:?}"), block_type.properties().name);
        }
        assert_eq!(BlockType::from_tag(BlockType::COUNT as u8), None);
    }

    #[test]
    fn opacity_classes() {
        assert_eq!(BlockType::Air.opacity(), Opacity::Empty);
        assert_eq!(BlockType::Stone.opacity(), Opacity::Opaque);
        for transparent in [BlockType::Water, BlockType::Leaves, BlockType::Ice, BlockType::Glass] {
            assert!(transparent.is_transparent());
        }
        assert!(!BlockType::Water.is_solid());
        assert!(!BlockType::Air.is_solid());
        assert!(BlockType::Bedrock.is_solid());
    }
}
