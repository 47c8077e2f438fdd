//! Per-coordinate streaming state.

/// Where a chunk coordinate is in its streaming lifecycle.
///
/// `Unloaded -> Queued -> Generating -> Dirty -> Meshing -> Meshed`, with
/// `Meshed -> Dirty -> Meshing -> Meshed` after edits or neighbor changes and
/// `Evicting -> Unloaded` when the chunk leaves range. `Failed` is terminal until the chunk is
/// evicted.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChunkState {
    /// Not tracked; not resident.
    Unloaded,
    /// Waiting in the request queue (or for a retry) for generation or meshing.
    Queued,
    /// Terrain generation or loading is in flight.
    Generating,
    /// Resident with terrain; the mesh needs (re)building.
    Dirty,
    /// A mesh build is in flight.
    Meshing,
    /// Resident with an up-to-date mesh.
    Meshed,
    /// Being persisted and erased. Never observed between ticks.
    Evicting,
    /// Exceeded the retry limit; skipped until evicted.
    Failed,
}

impl ChunkState {
    /// Work for this chunk is running on a worker.
    pub fn is_in_flight(self) -> bool {
        matches!(self, ChunkState::Generating | ChunkState::Meshing)
    }
}

/// Bookkeeping for one tracked coordinate.
#[derive(Clone, Debug)]
pub(crate) struct ChunkRecord {
    pub state: ChunkState,
    /// Ticket of the in-flight task; results carrying any other ticket are stale.
    pub ticket: u64,
    /// Consecutive failures.
    pub attempts: u32,
    /// Earliest tick at which a failed chunk may be retried.
    pub retry_at: u64,
}

impl ChunkRecord {
    pub fn queued() -> Self {
        Self {
            state: ChunkState::Queued,
            ticket: 0,
            attempts: 0,
            retry_at: 0,
        }
    }
}
