//! Seeded gradient noise.
//!
//! `NoiseField` wraps `noise::Perlin`, whose permutation table is derived from the seed once at
//! construction and never mutated, so one field can be shared by every worker thread without
//! locking and identical inputs always give identical outputs.

use noise::{NoiseFn, Perlin};

/// Deterministic 2D/3D Perlin noise plus fractal (multi-octave) sums for one seed.
#[derive(Clone)]
pub struct NoiseField {
    seed: u32,
    perlin: Perlin,
}

impl NoiseField {
    /// Builds the permutation table for `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            perlin: Perlin::new(seed),
        }
    }

    /// Seed this field was built from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Single-octave noise in `[-1, 1]`.
    #[inline]
    pub fn sample_2d(&self, x: f64, z: f64) -> f64 {
        self.perlin.get([x, z]).clamp(-1.0, 1.0)
    }

    /// Single-octave noise in `[-1, 1]`.
    #[inline]
    pub fn sample_3d(&self, x: f64, y: f64, z: f64) -> f64 {
        self.perlin.get([x, y, z]).clamp(-1.0, 1.0)
    }

    /// Sum of `octaves` samples, each at `lacunarity` times the previous frequency and
    /// `persistence` times the previous amplitude, divided by the total amplitude.
    /// An octave count of zero or less is treated as one.
    pub fn fractal_2d(
        &self,
        x: f64,
        z: f64,
        octaves: i32,
        persistence: f64,
        lacunarity: f64,
    ) -> f64 {
        fractal(octaves, persistence, lacunarity, |frequency| {
            self.sample_2d(x * frequency, z * frequency)
        })
    }

    /// 3D counterpart of [`NoiseField::fractal_2d`].
    pub fn fractal_3d(
        &self,
        x: f64,
        y: f64,
        z: f64,
        octaves: i32,
        persistence: f64,
        lacunarity: f64,
    ) -> f64 {
        fractal(octaves, persistence, lacunarity, |frequency| {
            self.sample_3d(x * frequency, y * frequency, z * frequency)
        })
    }
}

impl std::fmt::Debug for NoiseField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseField").field("seed", &self.seed).finish()
    }
}

fn fractal(octaves: i32, persistence: f64, lacunarity: f64, sample: impl Fn(f64) -> f64) -> f64 {
    let octaves = octaves.max(1);
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut max_value = 0.0;

    for _ in 0..octaves {
        total += sample(frequency) * amplitude;
        max_value += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if max_value == 0.0 {
        return 0.0;
    }
    total / max_value
}
