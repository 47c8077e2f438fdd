//! # Terrain Generation
//!
//! Fills a chunk's voxels from the world seed and the chunk coordinate alone. Nothing depends on
//! generation order or on neighboring chunks, so regenerating an evicted chunk reproduces it
//! exactly.
//!
//! ## Layers
//! 1. A fractal 2D height field gives each column a height in
//!    `baseline ..= baseline + 2 * amplitude`, clamped to the world's vertical range.
//! 2. The surface cell gets Grass, Sand or Stone by height; the next `subsurface_depth` cells get
//!    Dirt or Stone; everything deeper is Stone.
//! 3. Fractal 3D noise above `cave_threshold` carves any cell below the surface to Air.
//! 4. Optional Bedrock floor at y = 0 (never carved) and optional Water up to `sea_level`.

use log::warn;

use crate::config::TerrainConfig;
use crate::error::{VoxelError, VoxelResult};
use crate::generation::NoiseField;
use crate::world::block::{BlockType, Voxel};
use crate::world::chunk::{
    allocate_voxels, ChunkCoord, LocalPos, CHUNK_DEPTH, CHUNK_HEIGHT, CHUNK_VOLUME, CHUNK_WIDTH,
};

/// Deterministic chunk filler. Cheap to share: workers hold it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    noise: NoiseField,
}

impl TerrainGenerator {
    /// Creates a generator for `config.seed`.
    pub fn new(config: TerrainConfig) -> Self {
        let noise = NoiseField::new(config.seed);
        Self { config, noise }
    }

    /// Parameters in use.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// World seed.
    pub fn seed(&self) -> u32 {
        self.noise.seed()
    }

    /// Unclamped terrain height of the column at world `(x, z)`.
    pub fn raw_height(&self, x: i32, z: i32) -> f64 {
        let c = &self.config;
        let n = self.noise.fractal_2d(
            x as f64 * c.height_frequency,
            z as f64 * c.height_frequency,
            c.height_octaves,
            c.height_persistence,
            c.height_lacunarity,
        );
        c.baseline + (n + 1.0) * c.amplitude
    }

    /// Terrain height of the column at world `(x, z)`, clamped to `0..CHUNK_HEIGHT`.
    /// The second value is `true` when clamping was needed.
    pub fn column_height(&self, x: i32, z: i32) -> (usize, bool) {
        let raw = self.raw_height(x, z).floor();
        let max = (CHUNK_HEIGHT - 1) as f64;
        if raw.is_nan() {
            return (0, true);
        }
        let clamped = raw.clamp(0.0, max);
        (clamped as usize, clamped != raw)
    }

    /// `true` if the cave field carves the world cell.
    pub fn is_cave(&self, x: i32, y: i32, z: i32) -> bool {
        let c = &self.config;
        self.noise.fractal_3d(
            x as f64 * c.cave_frequency,
            y as f64 * c.cave_frequency,
            z as f64 * c.cave_frequency,
            c.cave_octaves,
            c.cave_persistence,
            c.cave_lacunarity,
        ) > c.cave_threshold
    }

    /// Top block of a column of the given height.
    pub fn surface_block(&self, height: usize) -> BlockType {
        let height = height as i32;
        if height > self.config.grass_threshold {
            BlockType::Grass
        } else if height > self.config.sand_threshold {
            BlockType::Sand
        } else {
            BlockType::Stone
        }
    }

    /// Block directly below the surface of a column of the given height.
    pub fn subsurface_block(&self, height: usize) -> BlockType {
        if height as i32 > self.config.dirt_threshold {
            BlockType::Dirt
        } else {
            BlockType::Stone
        }
    }

    /// Generates a fresh voxel array for `coord`.
    ///
    /// # Errors
    /// `ResourceExhausted` if the voxel array cannot be allocated.
    pub fn generate(&self, coord: ChunkCoord) -> VoxelResult<Box<[Voxel]>> {
        let mut voxels = allocate_voxels()?;
        self.generate_into(coord, &mut voxels)?;
        Ok(voxels)
    }

    /// Fills an existing array for `coord`, overwriting every cell.
    ///
    /// # Errors
    /// `InvalidState` if `voxels` does not hold exactly `CHUNK_VOLUME` entries.
    pub fn generate_into(&self, coord: ChunkCoord, voxels: &mut [Voxel]) -> VoxelResult<()> {
        if voxels.len() != CHUNK_VOLUME {
            return Err(VoxelError::InvalidState(format!(
                "terrain buffer for chunk {coord} holds {} voxels",
                voxels.len()
            )));
        }
        voxels.fill(Voxel::AIR);

        let origin = coord.origin();
        let mut clamped_columns = 0;

        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let wx = origin.x + x as i32;
                let wz = origin.z + z as i32;
                let (height, clamped) = self.column_height(wx, wz);
                if clamped {
                    clamped_columns += 1;
                }
                self.fill_column(voxels, x, z, wx, wz, height);
            }
        }

        if clamped_columns > 0 {
            warn!(
                "Chunk {coord}: {clamped_columns} column heights clamped to 0..{CHUNK_HEIGHT}"
            );
        }
        Ok(())
    }

    fn fill_column(&self, voxels: &mut [Voxel], x: usize, z: usize, wx: i32, wz: i32, height: usize) {
        let surface = self.surface_block(height);
        let subsurface = self.subsurface_block(height);
        let subsurface_depth = self.config.subsurface_depth.max(0) as usize;
        let bedrock = self.config.bedrock_floor;
        // Normalized fractal noise never exceeds 1.
        let caves = self.config.cave_threshold < 1.0;

        let mut set = |y: usize, block: BlockType| {
            if let Some(local) = LocalPos::new(x, y, z) {
                voxels[local.index()] = Voxel::new(block);
            }
        };

        for y in 0..=height {
            let block = if bedrock && y == 0 {
                BlockType::Bedrock
            } else if y == height {
                surface
            } else if caves && self.is_cave(wx, y as i32, wz) {
                continue;
            } else if y + subsurface_depth >= height {
                subsurface
            } else {
                BlockType::Stone
            };
            set(y, block);
        }

        if let Some(sea_level) = self.config.sea_level {
            let top = (sea_level.max(-1) as i64).min(CHUNK_HEIGHT as i64 - 1);
            for y in (height + 1) as i64..=top {
                set(y as usize, BlockType::Water);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(seed: u32) -> TerrainGenerator {
        TerrainGenerator::new(TerrainConfig {
            seed,
            ..TerrainConfig::default()
        })
    }

    fn at(voxels: &[Voxel], x: usize, y: usize, z: usize) -> Voxel {
        voxels[LocalPos::new(x, y, z).unwrap().index()]
    }

    #[test]
    fn reference_column_at_origin() {
        let generator = generator(42);
        let voxels = generator.generate(ChunkCoord::new(0, 0)).unwrap();
        let (height, clamped) = generator.column_height(0, 0);

        assert!(!clamped);
        assert!((40..=80).contains(&height), "height {height}");
        assert!(!at(&voxels, 0, height, 0).is_air());
        assert!(at(&voxels, 0, height + 1, 0).is_air());
    }

    #[test]
    fn generation_is_deterministic() {
        let mut rng = fastrand::Rng::with_seed(0xC0FFEE);
        for _ in 0..6 {
            let seed = rng.u32(..);
            let coord = ChunkCoord::new(rng.i32(-500..500), rng.i32(-500..500));
            let a = generator(seed).generate(coord).unwrap();
            let b = generator(seed).generate(coord).unwrap();
            assert!(a == b, "seed {seed} chunk {coord} differs");
        }
    }

    #[test]
    fn generation_does_not_depend_on_order() {
        let generator = generator(3);
        let first = generator.generate(ChunkCoord::new(5, 5)).unwrap();
        generator.generate(ChunkCoord::new(-8, 2)).unwrap();
        let again = generator.generate(ChunkCoord::new(5, 5)).unwrap();
        assert!(first == again);
    }

    #[test]
    fn surface_layers_follow_thresholds() {
        let generator = generator(1);
        assert_eq!(generator.surface_block(70), BlockType::Grass);
        assert_eq!(generator.surface_block(60), BlockType::Sand);
        assert_eq!(generator.surface_block(50), BlockType::Stone);
        assert_eq!(generator.subsurface_block(60), BlockType::Dirt);
        assert_eq!(generator.subsurface_block(50), BlockType::Stone);
    }

    #[test]
    fn columns_are_solid_floor_to_surface_without_caves() {
        let generator = TerrainGenerator::new(TerrainConfig {
            cave_threshold: 2.0,
            ..TerrainConfig::default()
        });
        let coord = ChunkCoord::new(-2, 3);
        let voxels = generator.generate(coord).unwrap();
        let origin = coord.origin();
        for z in 0..CHUNK_DEPTH {
            for x in 0..CHUNK_WIDTH {
                let (height, _) = generator.column_height(origin.x + x as i32, origin.z + z as i32);
                assert_eq!(at(&voxels, x, 0, z).block_type(), BlockType::Bedrock);
                for y in 1..=height {
                    assert!(!at(&voxels, x, y, z).is_air());
                }
                assert_eq!(
                    at(&voxels, x, height, z).block_type(),
                    generator.surface_block(height)
                );
                for y in height + 1..CHUNK_HEIGHT {
                    assert!(at(&voxels, x, y, z).is_air());
                }
            }
        }
    }

    #[test]
    fn caves_carve_below_surface_only() {
        let generator = TerrainGenerator::new(TerrainConfig {
            cave_threshold: -2.0,
            ..TerrainConfig::default()
        });
        let voxels = generator.generate(ChunkCoord::new(0, 0)).unwrap();
        let (height, _) = generator.column_height(0, 0);
        assert_eq!(at(&voxels, 0, 0, 0).block_type(), BlockType::Bedrock);
        for y in 1..height {
            assert!(at(&voxels, 0, y, 0).is_air());
        }
        assert!(!at(&voxels, 0, height, 0).is_air());
    }

    #[test]
    fn out_of_range_heights_are_clamped() {
        let generator = TerrainGenerator::new(TerrainConfig {
            baseline: 400.0,
            ..TerrainConfig::default()
        });
        let (height, clamped) = generator.column_height(3, 3);
        assert!(clamped);
        assert_eq!(height, CHUNK_HEIGHT - 1);
        let voxels = generator.generate(ChunkCoord::new(0, 0)).unwrap();
        assert!(!at(&voxels, 3, CHUNK_HEIGHT - 1, 3).is_air());

        let low = TerrainGenerator::new(TerrainConfig {
            baseline: -400.0,
            ..TerrainConfig::default()
        });
        assert_eq!(low.column_height(0, 0), (0, true));
    }

    #[test]
    fn sea_level_floods_low_columns() {
        let generator = TerrainGenerator::new(TerrainConfig {
            sea_level: Some(100),
            ..TerrainConfig::default()
        });
        let voxels = generator.generate(ChunkCoord::new(0, 0)).unwrap();
        let (height, _) = generator.column_height(0, 0);
        assert_eq!(at(&voxels, 0, height + 1, 0).block_type(), BlockType::Water);
        assert_eq!(at(&voxels, 0, 100, 0).block_type(), BlockType::Water);
        assert!(at(&voxels, 0, 101, 0).is_air());
    }
}
