//! One binary file per chunk.
//!
//! ## Format
//! | bytes | content |
//! |-------|---------|
//! | 4     | magic `VXCK` |
//! | 2     | format version, little-endian |
//! | 4     | voxel count, little-endian |
//! | 2 * n | packed voxels, little-endian, in chunk index order |
//!
//! Files are written to a temporary name and renamed, so a crash never leaves a truncated chunk
//! under the real name.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{VoxelError, VoxelResult};
use crate::persistence::ChunkPersistence;
use crate::world::block::Voxel;
use crate::world::chunk::{ChunkCoord, CHUNK_VOLUME};

const MAGIC: &[u8; 4] = b"VXCK";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 10;

/// Chunk files under a directory.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    root: PathBuf,
}

impl FilePersistence {
    /// Uses `root` as the save directory, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> VoxelResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Save directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that holds `coord`.
    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.root.join(format!("chunk_{}_{}.bin", coord.x, coord.z))
    }
}

/// Serializes a voxel array in the chunk file format.
pub fn encode_chunk(voxels: &[Voxel]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + voxels.len() * 2);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(voxels.len() as u32).to_le_bytes());
    for voxel in voxels {
        bytes.extend_from_slice(&voxel.raw().to_le_bytes());
    }
    bytes
}

/// Parses and validates a chunk file.
pub fn decode_chunk(bytes: &[u8]) -> VoxelResult<Box<[Voxel]>> {
    if bytes.len() < HEADER_LEN || &bytes[..4] != MAGIC {
        return Err(VoxelError::CorruptData("missing chunk file header".into()));
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(VoxelError::CorruptData(format!(
            "unsupported chunk format version {version}"
        )));
    }
    let count = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let body = &bytes[HEADER_LEN..];
    if count != CHUNK_VOLUME || body.len() != count * 2 {
        return Err(VoxelError::CorruptData(format!(
            "chunk file holds {count} voxels in {} bytes",
            body.len()
        )));
    }
    body.chunks_exact(2)
        .map(|pair| Voxel::from_raw(u16::from_le_bytes([pair[0], pair[1]])))
        .collect()
}

impl ChunkPersistence for FilePersistence {
    fn persist(&self, coord: ChunkCoord, voxels: &[Voxel]) -> VoxelResult<()> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(VoxelError::InvalidState(format!(
                "persisting chunk {coord} with {} voxels",
                voxels.len()
            )));
        }
        let path = self.chunk_path(coord);
        let tmp = path.with_extension("tmp");
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&encode_chunk(voxels))?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        debug!("Saved chunk {coord} to {}", path.display());
        Ok(())
    }

    fn try_load(&self, coord: ChunkCoord) -> VoxelResult<Option<Box<[Voxel]>>> {
        let path = self.chunk_path(coord);
        match fs::read(&path) {
            Ok(bytes) => decode_chunk(&bytes).map(Some),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}
