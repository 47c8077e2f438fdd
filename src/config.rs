//! # Configuration
//!
//! Streaming and terrain settings. Both structs deserialize from JSON with every field optional
//! (missing fields take their defaults) and are normalized by `validated()` before use.

use std::path::Path;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::VoxelResult;

/// Smallest accepted view distance, in chunks.
pub const MIN_VIEW_DISTANCE: u32 = 1;
/// Largest accepted view distance, in chunks.
pub const MAX_VIEW_DISTANCE: u32 = 64;
/// Largest accepted first retry delay, in ticks.
pub const MAX_RETRY_BACKOFF_TICKS: u64 = 1 << 16;

/// Terrain shape and material thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// World seed.
    pub seed: u32,
    /// Lowest terrain height.
    pub baseline: f64,
    /// Terrain spans `baseline ..= baseline + 2 * amplitude`.
    pub amplitude: f64,
    /// World-to-noise scale for the height field.
    pub height_frequency: f64,
    /// Octaves of the height field.
    pub height_octaves: i32,
    /// Amplitude falloff per height octave.
    pub height_persistence: f64,
    /// Frequency growth per height octave.
    pub height_lacunarity: f64,
    /// Surface is Grass when the column height is above this.
    pub grass_threshold: i32,
    /// Otherwise surface is Sand when the column height is above this, else Stone.
    pub sand_threshold: i32,
    /// Number of sub-surface cells below the surface cell.
    pub subsurface_depth: i32,
    /// Sub-surface is Dirt when the column height is above this, else Stone.
    pub dirt_threshold: i32,
    /// Cells whose cave noise exceeds this are carved to Air.
    pub cave_threshold: f64,
    /// World-to-noise scale for caves.
    pub cave_frequency: f64,
    /// Octaves of the cave field.
    pub cave_octaves: i32,
    /// Amplitude falloff per cave octave.
    pub cave_persistence: f64,
    /// Frequency growth per cave octave.
    pub cave_lacunarity: f64,
    /// Place uncarvable Bedrock at y = 0.
    pub bedrock_floor: bool,
    /// Fill Air above the terrain up to this height with Water.
    pub sea_level: Option<i32>,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            baseline: 40.0,
            amplitude: 20.0,
            height_frequency: 0.01,
            height_octaves: 4,
            height_persistence: 0.5,
            height_lacunarity: 2.0,
            grass_threshold: 62,
            sand_threshold: 58,
            subsurface_depth: 3,
            dirt_threshold: 58,
            cave_threshold: 0.5,
            cave_frequency: 0.05,
            cave_octaves: 3,
            cave_persistence: 0.5,
            cave_lacunarity: 2.0,
            bedrock_floor: true,
            sea_level: None,
        }
    }
}

/// Settings for [`crate::streaming::ChunkStreamer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Radius, in chunks, of the resident footprint around the observer.
    pub view_distance: u32,
    /// Extra chunks beyond `view_distance` before a chunk is evicted.
    pub hysteresis: u32,
    /// Hard cap on resident chunks.
    pub max_resident_chunks: usize,
    /// Generation and meshing tasks started per tick.
    pub work_budget_per_tick: usize,
    /// Background workers. Zero runs each task on the update thread when it is dispatched.
    pub worker_threads: usize,
    /// Failed attempts allowed before a chunk is marked permanently failed.
    pub max_retries: u32,
    /// Ticks to wait before the first retry; doubles per further attempt.
    pub retry_backoff_ticks: u64,
    /// Terrain parameters, including the seed.
    pub terrain: TerrainConfig,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            view_distance: 8,
            hysteresis: 2,
            max_resident_chunks: 1000,
            work_budget_per_tick: 8,
            worker_threads: 0,
            max_retries: 3,
            retry_backoff_ticks: 2,
            terrain: TerrainConfig::default(),
        }
    }
}

impl StreamingConfig {
    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> VoxelResult<Self> {
        Ok(serde_json::from_str::<Self>(json)?.validated())
    }

    /// Reads and parses a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VoxelResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serializes to pretty JSON.
    pub fn to_json_string(&self) -> VoxelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Clamps out-of-range values, logging each adjustment.
    pub fn validated(mut self) -> Self {
        self.view_distance = clamp_view_distance(self.view_distance);
        if self.work_budget_per_tick == 0 {
            warn!("work_budget_per_tick of 0 would stall streaming, using 1");
            self.work_budget_per_tick = 1;
        }
        if self.max_resident_chunks == 0 {
            warn!("max_resident_chunks of 0 would stall streaming, using 1");
            self.max_resident_chunks = 1;
        }
        if self.retry_backoff_ticks > MAX_RETRY_BACKOFF_TICKS {
            warn!(
                "retry_backoff_ticks {} clamped to {MAX_RETRY_BACKOFF_TICKS}",
                self.retry_backoff_ticks
            );
            self.retry_backoff_ticks = MAX_RETRY_BACKOFF_TICKS;
        }
        let footprint = footprint_size(self.view_distance);
        if self.max_resident_chunks < footprint {
            warn!(
                "max_resident_chunks ({}) is below the {} chunks within view distance {}; \
                 the farthest chunks will never be resident",
                self.max_resident_chunks, footprint, self.view_distance
            );
        }
        self
    }
}

/// Clamps a view distance to `MIN_VIEW_DISTANCE..=MAX_VIEW_DISTANCE`.
pub fn clamp_view_distance(view_distance: u32) -> u32 {
    let clamped = view_distance.clamp(MIN_VIEW_DISTANCE, MAX_VIEW_DISTANCE);
    if clamped != view_distance {
        warn!("view distance {view_distance} clamped to {clamped}");
    }
    clamped
}

/// Number of chunk coordinates with `dx² + dz² <= view_distance²`.
pub fn footprint_size(view_distance: u32) -> usize {
    let d = view_distance as i64;
    (-d..=d)
        .flat_map(|dx| (-d..=d).map(move |dz| (dx, dz)))
        .filter(|(dx, dz)| dx * dx + dz * dz <= d * d)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = StreamingConfig::from_json_str(
            r#"{ "view_distance": 4, "terrain": { "seed": 7, "cave_threshold": 0.8 } }"#,
        )
        .unwrap();
        assert_eq!(config.view_distance, 4);
        assert_eq!(config.hysteresis, 2);
        assert_eq!(config.max_resident_chunks, 1000);
        assert_eq!(config.terrain.seed, 7);
        assert_eq!(config.terrain.cave_threshold, 0.8);
        assert_eq!(config.terrain.baseline, 40.0);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config =
            StreamingConfig::from_json_str(r#"{ "view_distance": 500, "work_budget_per_tick": 0 }"#)
                .unwrap();
        assert_eq!(config.view_distance, MAX_VIEW_DISTANCE);
        assert_eq!(config.work_budget_per_tick, 1);
        assert_eq!(clamp_view_distance(0), MIN_VIEW_DISTANCE);
    }

    #[test]
    fn huge_retry_backoff_is_clamped() {
        let config = StreamingConfig {
            retry_backoff_ticks: u64::MAX,
            ..StreamingConfig::default()
        }
        .validated();
        assert_eq!(config.retry_backoff_ticks, MAX_RETRY_BACKOFF_TICKS);

        let config = StreamingConfig::from_json_str(r#"{ "retry_backoff_ticks": 5 }"#).unwrap();
        assert_eq!(config.retry_backoff_ticks, 5);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            StreamingConfig::from_json_str("{ view_distance: }"),
            Err(crate::error::VoxelError::Config(_))
        ));
    }

    #[test]
    fn json_round_trip() {
        let config = StreamingConfig::default();
        let json = config.to_json_string().unwrap();
        assert_eq!(StreamingConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn footprint_counts() {
        assert_eq!(footprint_size(0), 1);
        assert_eq!(footprint_size(1), 5);
        assert_eq!(footprint_size(2), 13);
    }
}
