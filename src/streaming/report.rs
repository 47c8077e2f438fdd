//! Per-tick results and running statistics of the streamer.

use std::time::Duration;

use serde::Serialize;

use crate::world::chunk::ChunkCoord;

/// What happened during one [`super::ChunkStreamer::tick`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Chunks whose new mesh can be taken with `take_mesh`.
    pub meshes_ready: Vec<ChunkCoord>,
    /// Chunks that were evicted; the renderer should free their buffers.
    pub evicted: Vec<ChunkCoord>,
    /// Chunks that exceeded the retry limit this tick.
    pub failed: Vec<ChunkCoord>,
    /// Generation and meshing tasks started.
    pub dispatched: usize,
}

/// Running totals since the streamer was created.
#[derive(Debug, Default, Clone, Serialize)]
pub struct StreamerStats {
    /// Chunks filled by the terrain generator.
    pub chunks_generated: u64,
    /// Chunks filled from persistence.
    pub chunks_loaded: u64,
    /// Meshes installed.
    pub chunks_meshed: u64,
    /// Chunks evicted for any reason.
    pub chunks_evicted: u64,
    /// Chunks evicted to respect the resident cap.
    pub evicted_under_pressure: u64,
    /// Modified chunks written to persistence on eviction.
    pub chunks_persisted: u64,
    /// Failed generation or meshing attempts.
    pub failures: u64,
    /// Worker results discarded because their chunk was evicted or re-queued meanwhile.
    pub stale_results: u64,
    /// Worker time spent generating or loading.
    pub generation_time: Duration,
    /// Worker time spent meshing.
    pub meshing_time: Duration,
}

impl StreamerStats {
    /// Mean generation time per chunk in milliseconds.
    pub fn average_generation_ms(&self) -> f64 {
        average_ms(self.generation_time, self.chunks_generated + self.chunks_loaded)
    }

    /// Mean meshing time per chunk in milliseconds.
    pub fn average_meshing_ms(&self) -> f64 {
        average_ms(self.meshing_time, self.chunks_meshed)
    }
}

fn average_ms(total: Duration, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        total.as_secs_f64() * 1000.0 / count as f64
    }
}
