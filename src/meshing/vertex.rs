//! Vertex format of chunk meshes.

/// A mesh vertex.
///
/// # Memory Layout
/// - Position: 3x f32, chunk-local (12 bytes)
/// - Normal: 3x f32 (12 bytes)
/// - UV: 2x f32, tiling in voxel units across merged quads (8 bytes)
/// - Color: RGBA8 from the block's property table (4 bytes)
/// - Block type tag: u32 (4 bytes)
///
/// Total size: 40 bytes, no padding, so the type is `bytemuck::Pod` and can be uploaded as is.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Position relative to the chunk origin.
    pub position: [f32; 3],
    /// Outward face normal.
    pub normal: [f32; 3],
    /// Texture coordinates; `(width, height)` at the far corner of a merged quad.
    pub uv: [f32; 2],
    /// Base color of the block type.
    pub color: [u8; 4],
    /// Block type tag.
    pub block_type: u32,
}
