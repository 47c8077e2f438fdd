#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel World
//!
//! A streaming voxel world: procedural terrain around a moving observer, greedy meshed and kept
//! within a bounded memory footprint.
//!
//! ## Key Modules
//!
//! * `world` - Voxels, chunks, the chunk store and solidity queries
//! * `generation` - Seeded noise and the terrain generator
//! * `meshing` - Face culling and greedy meshing into renderer-ready buffers
//! * `streaming` - The per-tick scheduler that generates, meshes and evicts chunks
//! * `task_management` - Worker threads the streamer offloads heavy work to
//! * `persistence` - Saving edited chunks on eviction and loading them back
//!
//! ## Usage
//!
//! ```rust
//! use voxel_world::config::StreamingConfig;
//! use voxel_world::streaming::ChunkStreamer;
//! use voxel_world::world::chunk::ChunkCoord;
//!
//! let config = StreamingConfig {
//!     view_distance: 1,
//!     ..StreamingConfig::default()
//! };
//! let mut streamer = ChunkStreamer::new(config).unwrap();
//! let observer = ChunkCoord::new(0, 0).center(80.0);
//! for _ in 0..20 {
//!     let report = streamer.tick(observer);
//!     for coord in report.meshes_ready {
//!         let _mesh = streamer.take_mesh(coord);
//!     }
//! }
//! assert!(streamer.resident_count() <= 5);
//! ```

use cgmath::Point3;
use log::info;

pub mod config;
pub mod core;
pub mod error;
pub mod generation;
pub mod meshing;
pub mod persistence;
pub mod streaming;
pub mod task_management;
pub mod world;

pub use config::{StreamingConfig, TerrainConfig};
pub use error::{VoxelError, VoxelResult};
pub use streaming::ChunkStreamer;

/// Stopwatch label for the demo walk.
pub const WALK_STOPWATCH: &str = "Observer Walk";

/// Sets up `env_logger` on stdout, filtered by `RUST_LOG`. Later calls are ignored.
pub fn init_logger() {
    let mut log_builder = env_logger::Builder::new();
    let _ = log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .try_init();
}

/// Walks an observer in a straight line along +x for `ticks` ticks and logs the streamer's
/// totals. Used by the binary.
pub fn run(config: StreamingConfig, ticks: u64, speed: f32) -> VoxelResult<()> {
    let mut streamer = ChunkStreamer::new(config)?;
    let start = web_time::Instant::now();
    let mut meshes = 0usize;

    for step in 0..ticks {
        let observer = Point3::new(step as f32 * speed, 80.0, 0.0);
        let report = streamer.tick(observer);
        for coord in &report.meshes_ready {
            if streamer.take_mesh(*coord).is_some() {
                meshes += 1;
            }
        }
        if step % 100 == 0 {
            info!(
                "tick {step}: observer chunk {:?}, {} resident, {} dispatched, {} evicted",
                streamer.observer_chunk(),
                streamer.resident_count(),
                report.dispatched,
                report.evicted.len()
            );
        }
    }

    let stats = streamer.stats();
    info!(
        "{WALK_STOPWATCH}: {ticks} ticks in {:?}, {meshes} meshes taken, \
         {:.2} ms/generation, {:.2} ms/mesh",
        start.elapsed(),
        stats.average_generation_ms(),
        stats.average_meshing_ms()
    );
    info!("{}", serde_json::to_string(stats)?);
    Ok(())
}
