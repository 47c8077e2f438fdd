//! # Generation Module
//!
//! Seeded noise and the terrain generator built on it.

mod noise_field;
mod terrain;

pub use noise_field::NoiseField;
pub use terrain::TerrainGenerator;
