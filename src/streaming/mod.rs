//! Observer-driven chunk streaming.
//!
//! Every [`ChunkStreamer::tick`] runs the same pipeline on the caller's thread:
//!
//! 1. drain finished worker results and install them, discarding stale ones by ticket
//! 2. recompute the circular footprint around the observer
//! 3. evict resident chunks beyond `view_distance + hysteresis`, persisting modified ones
//! 4. queue footprint chunks that need work and start up to `work_budget_per_tick` generation
//!    or meshing tasks, nearest first, never more than the workers can take right now
//! 5. enforce the resident cap by evicting the farthest chunks
//!
//! Heavy work only ever runs inside tasks. The chunk store, queue and records are touched by the
//! update thread alone.

mod chunk_state;
mod report;
mod request_queue;
mod tasks;

pub use chunk_state::ChunkState;
pub use report::{StreamerStats, TickReport};
pub use request_queue::RequestQueue;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use cgmath::Point3;
use log::{debug, error, info, trace, warn};

use crate::config::{clamp_view_distance, StreamingConfig};
use crate::error::{VoxelError, VoxelResult};
use crate::generation::TerrainGenerator;
use crate::meshing::MeshData;
use crate::persistence::ChunkPersistence;
use crate::task_management::TaskManager;
use crate::world::block::Voxel;
use crate::world::chunk::ChunkCoord;
use crate::world::{ChunkStore, OccupancyQuery};
use chunk_state::ChunkRecord;
use tasks::{ChunkOutcome, ChunkTask, ChunkTaskResult, ChunkWork};

/// Longest retry backoff, as a power of two of `retry_backoff_ticks`.
const MAX_BACKOFF_SHIFT: u32 = 6;

enum Dispatch {
    Started,
    Skipped,
    NoRoom,
}

/// Keeps the chunks around an observer generated and meshed.
pub struct ChunkStreamer {
    config: StreamingConfig,
    store: ChunkStore,
    generator: Arc<TerrainGenerator>,
    persistence: Option<Arc<dyn ChunkPersistence>>,
    tasks: TaskManager<ChunkTask>,
    queue: RequestQueue,
    records: HashMap<ChunkCoord, ChunkRecord>,
    /// Footprint of the last tick, nearest first.
    footprint: Vec<(ChunkCoord, i64)>,
    required: HashSet<ChunkCoord>,
    observer_chunk: Option<ChunkCoord>,
    tick: u64,
    next_ticket: u64,
    stats: StreamerStats,
}

impl ChunkStreamer {
    /// Creates a streamer without persistence; evicted edits are lost.
    ///
    /// # Errors
    /// `Io` if a worker thread cannot be spawned.
    pub fn new(config: StreamingConfig) -> VoxelResult<Self> {
        Self::build(config, None)
    }

    /// Creates a streamer that saves modified chunks on eviction and loads saved chunks before
    /// falling back to generation.
    pub fn with_persistence(
        config: StreamingConfig,
        persistence: Arc<dyn ChunkPersistence>,
    ) -> VoxelResult<Self> {
        Self::build(config, Some(persistence))
    }

    fn build(
        config: StreamingConfig,
        persistence: Option<Arc<dyn ChunkPersistence>>,
    ) -> VoxelResult<Self> {
        let config = config.validated();
        let tasks = TaskManager::new(config.worker_threads)?;
        info!(
            "Streaming with view distance {}, hysteresis {}, cap {}, {} workers, seed {}",
            config.view_distance,
            config.hysteresis,
            config.max_resident_chunks,
            tasks.worker_count(),
            config.terrain.seed
        );
        Ok(Self {
            generator: Arc::new(TerrainGenerator::new(config.terrain.clone())),
            config,
            store: ChunkStore::new(),
            persistence,
            tasks,
            queue: RequestQueue::new(),
            records: HashMap::new(),
            footprint: Vec::new(),
            required: HashSet::new(),
            observer_chunk: None,
            tick: 0,
            next_ticket: 0,
            stats: StreamerStats::default(),
        })
    }

    /// Advances streaming one step for an observer at `observer` (world units).
    pub fn tick(&mut self, observer: Point3<f32>) -> TickReport {
        self.tick += 1;
        let center = ChunkCoord::from_world_f32(observer).clamped_to_world();
        if self.observer_chunk != Some(center) {
            debug!("Observer entered chunk {center}");
            self.observer_chunk = Some(center);
        }

        let mut report = TickReport::default();
        self.handle_completed(&mut report);
        self.update_footprint(center);
        self.evict_out_of_range(center, &mut report);
        self.schedule();
        self.dispatch(center, &mut report);
        self.enforce_resident_cap(center, &mut report);
        self.tasks.process_queued_tasks();

        trace!(
            "Tick {}: {} resident, {} queued, {} in flight, {} dispatched",
            self.tick,
            self.store.len(),
            self.queue.len(),
            self.tasks.in_flight() + self.tasks.queued(),
            report.dispatched
        );
        report
    }

    fn handle_completed(&mut self, report: &mut TickReport) {
        for result in self.tasks.drain_completed() {
            let ChunkTaskResult {
                coord,
                ticket,
                elapsed,
                outcome,
            } = result;

            let current = self.records.get(&coord).map(|record| record.ticket);
            if current != Some(ticket) || !self.store.contains(coord) {
                trace!("Discarding stale result for chunk {coord}");
                self.stats.stale_results += 1;
                continue;
            }

            match outcome {
                ChunkOutcome::Generated { voxels, loaded } => {
                    self.stats.generation_time += elapsed;
                    match self.store.install_voxels(coord, voxels) {
                        Ok(()) => {
                            if loaded {
                                self.stats.chunks_loaded += 1;
                            } else {
                                self.stats.chunks_generated += 1;
                            }
                            self.settle(coord, ChunkState::Dirty);
                        }
                        Err(err) => self.record_failure(coord, err, report),
                    }
                }
                ChunkOutcome::Meshed { mesh, revision } => {
                    self.stats.meshing_time += elapsed;
                    let still_dirty = match self.store.try_get(coord) {
                        Some(chunk) => {
                            let mut chunk = chunk.get_mut();
                            chunk.install_mesh(Arc::new(mesh), revision);
                            chunk.is_dirty()
                        }
                        None => true,
                    };
                    self.stats.chunks_meshed += 1;
                    report.meshes_ready.push(coord);
                    let state = if still_dirty {
                        ChunkState::Dirty
                    } else {
                        ChunkState::Meshed
                    };
                    self.settle(coord, state);
                }
                ChunkOutcome::Failed(err) => self.record_failure(coord, err, report),
            }
        }
    }

    /// Moves a record out of flight after a success.
    fn settle(&mut self, coord: ChunkCoord, state: ChunkState) {
        if let Some(record) = self.records.get_mut(&coord) {
            record.state = state;
            record.ticket = 0;
            record.attempts = 0;
            record.retry_at = 0;
        }
    }

    fn record_failure(&mut self, coord: ChunkCoord, err: VoxelError, report: &mut TickReport) {
        self.stats.failures += 1;
        let Some(record) = self.records.get_mut(&coord) else {
            return;
        };
        record.ticket = 0;
        record.attempts = record.attempts.saturating_add(1);

        if !err.is_retryable() {
            record.state = ChunkState::Failed;
            error!("Chunk {coord} cannot be recovered, giving up: {err}");
            report.failed.push(coord);
        } else if record.attempts > self.config.max_retries {
            record.state = ChunkState::Failed;
            error!(
                "Chunk {coord} failed {} times, giving up: {err}",
                record.attempts
            );
            report.failed.push(coord);
        } else {
            let shift = (record.attempts - 1).min(MAX_BACKOFF_SHIFT);
            let backoff = self
                .config
                .retry_backoff_ticks
                .max(1)
                .saturating_mul(1 << shift);
            record.retry_at = self.tick.saturating_add(backoff);
            record.state = ChunkState::Queued;
            warn!(
                "Chunk {coord} attempt {} failed, retrying in {backoff} ticks: {err}",
                record.attempts
            );
        }
    }

    fn update_footprint(&mut self, center: ChunkCoord) {
        let d = self.config.view_distance as i32;
        let limit = (d as i64) * (d as i64);

        self.footprint.clear();
        for dx in -d..=d {
            for dz in -d..=d {
                let coord = center.offset(dx, dz);
                let distance = coord.distance_squared(center);
                if distance <= limit {
                    self.footprint.push((coord, distance));
                }
            }
        }
        self.footprint.sort_by_key(|&(coord, distance)| (distance, coord));
        self.required = self.footprint.iter().map(|&(coord, _)| coord).collect();
    }

    /// Queues every chunk in the footprint that needs generation or meshing and forgets
    /// requests that left it.
    fn schedule(&mut self) {
        let required = &self.required;
        self.queue.retain(|coord| required.contains(&coord));
        let store = &self.store;
        self.records
            .retain(|coord, _| store.contains(*coord) || required.contains(coord));

        for &(coord, priority) in &self.footprint {
            let chunk_dirty = self
                .store
                .try_get(coord)
                .map(|chunk| chunk.get().is_dirty());
            let record = self.records.entry(coord).or_insert_with(ChunkRecord::queued);
            match record.state {
                ChunkState::Queued if record.retry_at <= self.tick => {
                    self.queue.upsert(coord, priority)
                }
                ChunkState::Dirty => self.queue.upsert(coord, priority),
                ChunkState::Meshed if chunk_dirty == Some(true) => {
                    record.state = ChunkState::Dirty;
                    self.queue.upsert(coord, priority);
                }
                _ => {}
            }
        }
    }

    /// Starts queued work while both the tick budget and free worker capacity last. Work the
    /// workers cannot take yet stays in the request queue, where it is reprioritized or dropped
    /// as the observer moves.
    fn dispatch(&mut self, center: ChunkCoord, report: &mut TickReport) {
        while report.dispatched < self.config.work_budget_per_tick && self.tasks.free_slots() > 0 {
            let Some((coord, priority)) = self.queue.pop() else {
                break;
            };
            match self.start_work(coord, priority, center, report) {
                Dispatch::Started => report.dispatched += 1,
                Dispatch::Skipped => {}
                Dispatch::NoRoom => {
                    self.queue.upsert(coord, priority);
                    break;
                }
            }
        }
    }

    fn start_work(
        &mut self,
        coord: ChunkCoord,
        priority: i64,
        center: ChunkCoord,
        report: &mut TickReport,
    ) -> Dispatch {
        match self.records.get(&coord).map(|record| record.state) {
            Some(ChunkState::Queued | ChunkState::Dirty) => {}
            _ => return Dispatch::Skipped,
        }

        if !self.store.contains(coord) {
            if self.store.len() >= self.config.max_resident_chunks
                && !self.make_room(center, priority, report)
            {
                return Dispatch::NoRoom;
            }
            if let Err(err) = self.store.get_or_create(coord) {
                self.record_failure(coord, err, report);
                return Dispatch::Skipped;
            }
        }
        let Some(chunk) = self.store.try_get(coord).cloned() else {
            return Dispatch::Skipped;
        };

        let (generated, dirty) = {
            let chunk = chunk.get();
            (chunk.is_generated(), chunk.is_dirty())
        };
        let (work, state) = if !generated {
            let work = ChunkWork::Generate {
                generator: Arc::clone(&self.generator),
                persistence: self.persistence.clone(),
            };
            (work, ChunkState::Generating)
        } else if dirty {
            let neighbors = coord
                .neighbors()
                .map(|neighbor| self.store.try_get(neighbor).cloned());
            let work = ChunkWork::Mesh {
                center: chunk,
                neighbors,
            };
            (work, ChunkState::Meshing)
        } else {
            self.settle(coord, ChunkState::Meshed);
            return Dispatch::Skipped;
        };

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        if let Some(record) = self.records.get_mut(&coord) {
            record.state = state;
            record.ticket = ticket;
        }
        self.tasks.publish_task(ChunkTask {
            coord,
            ticket,
            work,
        });
        Dispatch::Started
    }

    /// Evicts the farthest resident chunk if it is strictly farther than the request.
    fn make_room(&mut self, center: ChunkCoord, priority: i64, report: &mut TickReport) -> bool {
        let farthest = self
            .store
            .coords()
            .map(|coord| (coord.distance_squared(center), coord))
            .max();
        match farthest {
            Some((distance, coord)) if distance > priority => {
                warn!("Resident cap reached, evicting chunk {coord} for a nearer one");
                self.evict(coord, true, report);
                true
            }
            _ => false,
        }
    }

    fn evict_out_of_range(&mut self, center: ChunkCoord, report: &mut TickReport) {
        let reach = (self.config.view_distance + self.config.hysteresis) as i64;
        let limit = reach * reach;
        let mut far: Vec<(i64, ChunkCoord)> = self
            .store
            .coords()
            .map(|coord| (coord.distance_squared(center), coord))
            .filter(|&(distance, _)| distance > limit)
            .collect();
        far.sort_unstable_by(|a, b| b.cmp(a));
        for (_, coord) in far {
            self.evict(coord, false, report);
        }
    }

    fn enforce_resident_cap(&mut self, center: ChunkCoord, report: &mut TickReport) {
        let cap = self.config.max_resident_chunks;
        if self.store.len() <= cap {
            return;
        }
        let mut by_distance: Vec<(i64, ChunkCoord)> = self
            .store
            .coords()
            .map(|coord| (coord.distance_squared(center), coord))
            .collect();
        by_distance.sort_unstable_by(|a, b| b.cmp(a));
        let excess = by_distance.len() - cap;
        warn!("{} resident chunks exceed the cap of {cap}, evicting {excess}", by_distance.len());
        for (_, coord) in by_distance.into_iter().take(excess) {
            self.evict(coord, true, report);
        }
    }

    /// Persists the chunk if it holds edits, then drops it and everything tracked for it.
    /// In-flight results for it become stale.
    fn evict(&mut self, coord: ChunkCoord, under_pressure: bool, report: &mut TickReport) {
        if let Some(record) = self.records.get_mut(&coord) {
            record.state = ChunkState::Evicting;
        }

        if let (Some(persistence), Some(chunk)) = (&self.persistence, self.store.try_get(coord)) {
            let chunk = chunk.get();
            if chunk.is_generated() && chunk.is_modified() {
                match persistence.persist(coord, chunk.voxels()) {
                    Ok(()) => self.stats.chunks_persisted += 1,
                    Err(err) => error!("Failed to persist chunk {coord}, its edits are lost: {err}"),
                }
            }
        }

        self.store.erase(coord);
        self.records.remove(&coord);
        self.queue.remove(coord);
        self.purge_stale_tasks();
        self.stats.chunks_evicted += 1;
        if under_pressure {
            self.stats.evicted_under_pressure += 1;
        }
        report.evicted.push(coord);
    }

    /// Drops tasks still waiting for a worker whose chunk was evicted or re-dispatched since.
    fn purge_stale_tasks(&mut self) {
        if self.tasks.queued() == 0 {
            return;
        }
        let records = &self.records;
        let dropped = self.tasks.retain_queued(|task| {
            records
                .get(&task.coord)
                .is_some_and(|record| record.ticket == task.ticket)
        });
        if dropped > 0 {
            debug!("Dropped {dropped} queued tasks that are no longer needed");
        }
    }

    /// Reads a voxel; positions in chunks that are not resident read as Air.
    pub fn voxel(&self, pos: Point3<i32>) -> Voxel {
        self.store.voxel(pos)
    }

    /// Edits a voxel. The owning chunk and any neighbor sharing the touched face are remeshed
    /// on a following tick.
    ///
    /// # Errors
    /// `OutOfBounds` for y outside the world, `InvalidState` if the chunk is not resident or
    /// still generating.
    pub fn set_voxel(&mut self, pos: Point3<i32>, voxel: Voxel) -> VoxelResult<()> {
        self.store.set_voxel(pos, voxel)
    }

    /// Read-only view of resident chunks.
    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Solidity queries over resident chunks.
    pub fn occupancy(&self) -> OccupancyQuery<'_> {
        OccupancyQuery::new(&self.store)
    }

    /// The terrain generator currently in use.
    pub fn generator(&self) -> &TerrainGenerator {
        &self.generator
    }

    /// Whether a mesh for `coord` is waiting to be taken.
    pub fn has_pending_mesh(&self, coord: ChunkCoord) -> bool {
        self.store
            .try_get(coord)
            .is_some_and(|chunk| chunk.get().has_pending_mesh())
    }

    /// Takes the latest mesh for `coord` if one was installed since the last take.
    pub fn take_mesh(&self, coord: ChunkCoord) -> Option<Arc<MeshData>> {
        self.store
            .try_get(coord)
            .and_then(|chunk| chunk.get_mut().take_mesh())
    }

    /// Lifecycle state of a coordinate.
    pub fn state(&self, coord: ChunkCoord) -> ChunkState {
        self.records
            .get(&coord)
            .map_or(ChunkState::Unloaded, |record| record.state)
    }

    /// Resident chunks that exceeded the retry limit, sorted.
    pub fn failed_chunks(&self) -> Vec<ChunkCoord> {
        let mut failed: Vec<ChunkCoord> = self
            .records
            .iter()
            .filter(|(_, record)| record.state == ChunkState::Failed)
            .map(|(&coord, _)| coord)
            .collect();
        failed.sort_unstable();
        failed
    }

    /// Number of resident chunks.
    pub fn resident_count(&self) -> usize {
        self.store.len()
    }

    /// Nothing queued, nothing in flight and every chunk of the current footprint settled.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
            && self.tasks.is_idle()
            && self.records.iter().all(|(coord, record)| {
                if record.state.is_in_flight() {
                    return false;
                }
                match record.state {
                    ChunkState::Queued | ChunkState::Dirty => !self.required.contains(coord),
                    ChunkState::Meshed => {
                        !self.required.contains(coord)
                            || !self
                                .store
                                .try_get(*coord)
                                .is_some_and(|chunk| chunk.get().is_dirty())
                    }
                    ChunkState::Evicting => false,
                    _ => true,
                }
            })
    }

    /// Changes the view distance; takes effect on the next tick.
    pub fn set_view_distance(&mut self, view_distance: u32) {
        self.config.view_distance = clamp_view_distance(view_distance);
        info!("View distance set to {}", self.config.view_distance);
    }

    /// Discards all terrain and regenerates the chunks of the last footprint. Unsaved edits in
    /// them are lost; their old voxels and meshes stay readable until replacements arrive.
    /// Resident chunks outside the footprint are evicted like out-of-range chunks and returned.
    pub fn regenerate_all(&mut self) -> Vec<ChunkCoord> {
        let mut report = TickReport::default();
        let mut coords: Vec<ChunkCoord> = self.store.coords().collect();
        coords.sort_unstable();
        let mut regenerated = 0usize;
        for coord in coords {
            if !self.required.contains(&coord) {
                self.evict(coord, false, &mut report);
                continue;
            }
            if let Some(chunk) = self.store.try_get(coord) {
                chunk.get_mut().invalidate_terrain();
            }
            self.records.insert(coord, ChunkRecord::queued());
            regenerated += 1;
        }
        self.queue.clear();
        self.purge_stale_tasks();
        info!(
            "Regenerating {regenerated} chunks, evicted {} outside the footprint",
            report.evicted.len()
        );
        report.evicted
    }

    /// Switches to a new world seed and regenerates the footprint. Returns the chunks evicted
    /// on the way.
    pub fn set_seed(&mut self, seed: u32) -> Vec<ChunkCoord> {
        self.config.terrain.seed = seed;
        self.generator = Arc::new(TerrainGenerator::new(self.config.terrain.clone()));
        info!("World seed set to {seed}");
        self.regenerate_all()
    }

    /// Evicts every resident chunk, persisting modified ones, and returns what was evicted.
    pub fn clear(&mut self) -> Vec<ChunkCoord> {
        let mut report = TickReport::default();
        let mut coords: Vec<ChunkCoord> = self.store.coords().collect();
        coords.sort_unstable();
        for coord in coords {
            self.evict(coord, false, &mut report);
        }
        self.records.clear();
        self.queue.clear();
        report.evicted
    }

    /// Running totals.
    pub fn stats(&self) -> &StreamerStats {
        &self.stats
    }

    /// Active configuration after validation.
    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Ticks run so far.
    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Chunk the observer was in on the last tick.
    pub fn observer_chunk(&self) -> Option<ChunkCoord> {
        self.observer_chunk
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::config::{TerrainConfig, MAX_RETRY_BACKOFF_TICKS};
    use crate::persistence::MemoryPersistence;
    use crate::world::block::BlockType;
    use crate::world::chunk::{LocalPos, CHUNK_VOLUME, MAX_OBSERVER_CHUNK};

    fn small_config(view_distance: u32) -> StreamingConfig {
        StreamingConfig {
            view_distance,
            hysteresis: 1,
            work_budget_per_tick: 64,
            terrain: TerrainConfig {
                cave_threshold: 2.0,
                ..TerrainConfig::default()
            },
            ..StreamingConfig::default()
        }
    }

    fn run_until_idle(streamer: &mut ChunkStreamer, observer: Point3<f32>) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..500 {
            reports.push(streamer.tick(observer));
            if streamer.is_idle() {
                return reports;
            }
        }
        panic!("streamer did not settle");
    }

    struct BrokenPersistence;

    impl ChunkPersistence for BrokenPersistence {
        fn persist(&self, _coord: ChunkCoord, _voxels: &[Voxel]) -> VoxelResult<()> {
            Err(VoxelError::InvalidState("read-only".into()))
        }

        fn try_load(&self, coord: ChunkCoord) -> VoxelResult<Option<Box<[Voxel]>>> {
            if coord == ChunkCoord::new(1, 0) {
                Err(VoxelError::CorruptData("bad header".into()))
            } else {
                Ok(None)
            }
        }
    }

    /// Fails the first `remaining` loads, then finds nothing saved.
    struct FlakyPersistence {
        remaining: AtomicU32,
    }

    impl ChunkPersistence for FlakyPersistence {
        fn persist(&self, _coord: ChunkCoord, _voxels: &[Voxel]) -> VoxelResult<()> {
            Ok(())
        }

        fn try_load(&self, _coord: ChunkCoord) -> VoxelResult<Option<Box<[Voxel]>>> {
            let failed = self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                Err(VoxelError::Io(std::io::Error::new(
                    std::io::ErrorKind::Interrupted,
                    "disk busy",
                )))
            } else {
                Ok(None)
            }
        }
    }

    #[test]
    fn settles_with_every_footprint_chunk_meshed() {
        let mut streamer = ChunkStreamer::new(small_config(2)).unwrap();
        let origin = ChunkCoord::new(0, 0);
        run_until_idle(&mut streamer, origin.center(64.0));

        assert_eq!(streamer.resident_count(), 13);
        for dx in -2..=2 {
            for dz in -2..=2 {
                let coord = origin.offset(dx, dz);
                let expected = if dx * dx + dz * dz <= 4 {
                    ChunkState::Meshed
                } else {
                    ChunkState::Unloaded
                };
                assert_eq!(streamer.state(coord), expected, "chunk {coord}");
            }
        }
        assert!(streamer.take_mesh(origin).is_some());
        assert!(streamer.take_mesh(origin).is_none());
        assert_eq!(streamer.stats().chunks_generated, 13);
    }

    #[test]
    fn nearest_chunk_is_dispatched_first() {
        let config = StreamingConfig {
            work_budget_per_tick: 1,
            ..small_config(3)
        };
        let mut streamer = ChunkStreamer::new(config).unwrap();
        let report = streamer.tick(ChunkCoord::new(5, 5).center(64.0));
        assert_eq!(report.dispatched, 1);
        assert_eq!(streamer.state(ChunkCoord::new(5, 5)), ChunkState::Generating);
        assert_eq!(streamer.resident_count(), 1);
    }

    #[test]
    fn edits_trigger_remesh_of_owner_and_neighbor() {
        let mut streamer = ChunkStreamer::new(small_config(2)).unwrap();
        let observer = ChunkCoord::new(0, 0).center(64.0);
        run_until_idle(&mut streamer, observer);
        let _ = streamer.take_mesh(ChunkCoord::new(0, 0));
        let _ = streamer.take_mesh(ChunkCoord::new(-1, 0));

        streamer
            .set_voxel(Point3::new(0, 120, 3), Voxel::new(BlockType::Glass))
            .unwrap();
        assert_eq!(streamer.voxel(Point3::new(0, 120, 3)).block_type(), BlockType::Glass);

        let reports = run_until_idle(&mut streamer, observer);
        let ready: HashSet<ChunkCoord> = reports
            .iter()
            .flat_map(|report| report.meshes_ready.iter().copied())
            .collect();
        assert!(ready.contains(&ChunkCoord::new(0, 0)));
        assert!(ready.contains(&ChunkCoord::new(-1, 0)));
        assert!(!ready.contains(&ChunkCoord::new(1, 0)));
        assert!(streamer.has_pending_mesh(ChunkCoord::new(0, 0)));
    }

    #[test]
    fn edits_outside_resident_chunks_are_rejected() {
        let mut streamer = ChunkStreamer::new(small_config(1)).unwrap();
        let far = Point3::new(10_000, 10, 10_000);
        assert!(matches!(
            streamer.set_voxel(far, Voxel::new(BlockType::Stone)),
            Err(VoxelError::InvalidState(_))
        ));
        assert!(matches!(
            streamer.set_voxel(Point3::new(0, -1, 0), Voxel::new(BlockType::Stone)),
            Err(VoxelError::OutOfBounds { .. })
        ));
        assert!(streamer.voxel(far).is_air());
    }

    #[test]
    fn persistent_load_errors_end_in_failed_state() {
        let config = StreamingConfig {
            max_retries: 2,
            retry_backoff_ticks: 1,
            ..small_config(1)
        };
        let mut streamer =
            ChunkStreamer::with_persistence(config, Arc::new(BrokenPersistence)).unwrap();
        let observer = ChunkCoord::new(0, 0).center(64.0);
        let reports = run_until_idle(&mut streamer, observer);

        let bad = ChunkCoord::new(1, 0);
        assert_eq!(streamer.state(bad), ChunkState::Failed);
        assert_eq!(streamer.failed_chunks(), vec![bad]);
        assert_eq!(streamer.stats().failures, 3);
        assert_eq!(
            reports
                .iter()
                .filter(|report| report.failed.contains(&bad))
                .count(),
            1
        );
        // The hole reads as Air; the others are meshed.
        assert!(streamer.voxel(Point3::new(16, 1, 0)).is_air());
        assert_eq!(streamer.state(ChunkCoord::new(-1, 0)), ChunkState::Meshed);

        // Leaving and returning clears the failure and tries again.
        run_until_idle(&mut streamer, ChunkCoord::new(40, 0).center(64.0));
        assert_eq!(streamer.state(bad), ChunkState::Unloaded);
        assert!(streamer.failed_chunks().is_empty());
    }

    #[test]
    fn cap_is_respected_and_nearest_chunks_win() {
        let config = StreamingConfig {
            max_resident_chunks: 5,
            ..small_config(2)
        };
        let mut streamer = ChunkStreamer::new(config).unwrap();
        let origin = ChunkCoord::new(0, 0);
        for _ in 0..50 {
            streamer.tick(origin.center(64.0));
            assert!(streamer.resident_count() <= 5);
        }
        let mut resident: Vec<ChunkCoord> = streamer.store().coords().collect();
        resident.sort_unstable();
        let mut expected = vec![origin];
        expected.extend(origin.neighbors());
        expected.sort_unstable();
        assert_eq!(resident, expected);
    }

    #[test]
    fn regenerate_with_new_seed_replaces_terrain() {
        let persistence = Arc::new(MemoryPersistence::new(16));
        let mut streamer =
            ChunkStreamer::with_persistence(small_config(1), persistence).unwrap();
        let origin = ChunkCoord::new(0, 0);
        let observer = origin.center(64.0);
        run_until_idle(&mut streamer, observer);

        streamer.set_seed(7);
        assert_eq!(streamer.state(origin), ChunkState::Queued);
        assert!(streamer
            .set_voxel(Point3::new(1, 1, 1), Voxel::new(BlockType::Glass))
            .is_err());
        run_until_idle(&mut streamer, observer);

        let expected = TerrainGenerator::new(TerrainConfig {
            seed: 7,
            ..streamer.config().terrain.clone()
        })
        .generate(origin)
        .unwrap();
        let chunk = streamer.store().try_get(origin).unwrap().get();
        assert_eq!(chunk.voxels().len(), CHUNK_VOLUME);
        assert!(chunk.voxels() == &expected[..]);
        assert_eq!(streamer.generator().seed(), 7);
    }

    #[test]
    fn clear_evicts_everything() {
        let mut streamer = ChunkStreamer::new(small_config(1)).unwrap();
        run_until_idle(&mut streamer, ChunkCoord::new(0, 0).center(64.0));
        let evicted = streamer.clear();
        assert_eq!(evicted.len(), 5);
        assert_eq!(streamer.resident_count(), 0);
        assert_eq!(streamer.state(ChunkCoord::new(0, 0)), ChunkState::Unloaded);
        assert_eq!(streamer.stats().chunks_evicted, 5);
    }

    #[test]
    fn transient_load_errors_recover_after_backoff() {
        let config = StreamingConfig {
            max_retries: 3,
            retry_backoff_ticks: 2,
            ..small_config(1)
        };
        let persistence = Arc::new(FlakyPersistence {
            remaining: AtomicU32::new(2),
        });
        let mut streamer = ChunkStreamer::with_persistence(config, persistence).unwrap();
        let origin = ChunkCoord::new(0, 0);
        let observer = origin.center(64.0);

        streamer.tick(observer);
        streamer.tick(observer);
        assert_eq!(streamer.state(origin), ChunkState::Queued);

        let reports = run_until_idle(&mut streamer, observer);
        assert_eq!(streamer.state(origin), ChunkState::Meshed);
        assert!(streamer.failed_chunks().is_empty());
        assert!(reports.iter().all(|report| report.failed.is_empty()));
        assert_eq!(streamer.stats().failures, 2);
        assert_eq!(streamer.stats().chunks_generated, 5);
        assert_eq!(streamer.records[&origin].attempts, 0);
    }

    #[test]
    fn failed_meshing_keeps_the_previous_mesh() {
        let config = StreamingConfig {
            max_retries: 2,
            retry_backoff_ticks: 1,
            ..small_config(1)
        };
        let mut streamer = ChunkStreamer::new(config).unwrap();
        let origin = ChunkCoord::new(0, 0);
        let observer = origin.center(64.0);
        run_until_idle(&mut streamer, observer);
        let previous = streamer
            .store()
            .try_get(origin)
            .and_then(|chunk| chunk.get().mesh().cloned())
            .unwrap();

        tasks::FAULTY_MESH.with(|faulty| faulty.set(Some(origin)));
        let pos = Point3::new(5, 150, 5);
        streamer.set_voxel(pos, Voxel::new(BlockType::Glass)).unwrap();
        let reports = run_until_idle(&mut streamer, observer);
        tasks::FAULTY_MESH.with(|faulty| faulty.set(None));

        assert_eq!(streamer.state(origin), ChunkState::Failed);
        assert_eq!(streamer.failed_chunks(), vec![origin]);
        assert_eq!(streamer.stats().failures, 3);
        assert!(reports
            .iter()
            .all(|report| !report.meshes_ready.contains(&origin)));
        assert_eq!(streamer.voxel(pos).block_type(), BlockType::Glass);
        let current = streamer
            .store()
            .try_get(origin)
            .and_then(|chunk| chunk.get().mesh().cloned())
            .unwrap();
        assert!(Arc::ptr_eq(&current, &previous));
        for neighbor in origin.neighbors() {
            assert_eq!(streamer.state(neighbor), ChunkState::Meshed);
        }
    }

    #[test]
    fn unrecoverable_errors_fail_without_retrying() {
        let mut streamer = ChunkStreamer::new(small_config(1)).unwrap();
        let origin = ChunkCoord::new(0, 0);
        streamer.tick(origin.center(64.0));

        let mut report = TickReport::default();
        streamer.record_failure(
            origin,
            VoxelError::InvalidState("chunk (0, 0) expected 65536 voxels, got 3".into()),
            &mut report,
        );
        assert_eq!(streamer.state(origin), ChunkState::Failed);
        assert_eq!(streamer.records[&origin].attempts, 1);
        assert_eq!(report.failed, vec![origin]);

        let neighbor = ChunkCoord::new(1, 0);
        streamer.record_failure(
            neighbor,
            VoxelError::ResourceExhausted("voxel array".into()),
            &mut report,
        );
        assert_eq!(streamer.state(neighbor), ChunkState::Queued);
        assert_eq!(report.failed, vec![origin]);

        run_until_idle(&mut streamer, origin.center(64.0));
        assert_eq!(streamer.failed_chunks(), vec![origin]);
        assert_eq!(streamer.state(neighbor), ChunkState::Meshed);
    }

    #[test]
    fn huge_retry_backoff_saturates() {
        let config = StreamingConfig {
            retry_backoff_ticks: u64::MAX,
            max_retries: 5,
            ..small_config(1)
        };
        let mut streamer =
            ChunkStreamer::with_persistence(config, Arc::new(BrokenPersistence)).unwrap();
        assert_eq!(streamer.config().retry_backoff_ticks, MAX_RETRY_BACKOFF_TICKS);

        streamer.config.retry_backoff_ticks = u64::MAX;
        streamer.tick = u64::MAX - 10;
        let observer = ChunkCoord::new(0, 0).center(64.0);
        for _ in 0..5 {
            streamer.tick(observer);
        }

        let bad = ChunkCoord::new(1, 0);
        assert_eq!(streamer.state(bad), ChunkState::Queued);
        assert_eq!(streamer.records[&bad].retry_at, u64::MAX);
        assert_eq!(streamer.stats().failures, 1);
        assert_eq!(streamer.state(ChunkCoord::new(0, 0)), ChunkState::Meshed);
    }

    #[test]
    fn fast_observer_never_builds_a_task_backlog() {
        let config = StreamingConfig {
            worker_threads: 1,
            work_budget_per_tick: 16,
            hysteresis: 0,
            ..small_config(2)
        };
        let mut streamer = ChunkStreamer::new(config).unwrap();

        for step in 0..60 {
            let report = streamer.tick(ChunkCoord::new(step * 20, 0).center(64.0));
            assert!(report.dispatched <= 1);
            assert_eq!(streamer.tasks.queued(), 0);
            assert!(streamer.tasks.in_flight() <= 1);
            assert!(streamer.resident_count() <= 13);
        }

        let last = ChunkCoord::new(59 * 20, 0);
        for _ in 0..20_000 {
            streamer.tick(last.center(64.0));
            if streamer.is_idle() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(streamer.is_idle());
        assert_eq!(streamer.resident_count(), 13);
        assert_eq!(streamer.state(last), ChunkState::Meshed);
    }

    #[test]
    fn reseeding_evicts_chunks_outside_the_footprint() {
        let mut streamer = ChunkStreamer::new(small_config(2)).unwrap();
        run_until_idle(&mut streamer, ChunkCoord::new(0, 0).center(64.0));
        let moved = ChunkCoord::new(1, 0);
        run_until_idle(&mut streamer, moved.center(64.0));

        // Outside the view distance, inside the hysteresis band.
        let mut band: Vec<ChunkCoord> = streamer
            .store()
            .coords()
            .filter(|coord| coord.distance_squared(moved) > 4)
            .collect();
        band.sort_unstable();
        let lingering = ChunkCoord::new(-1, 1);
        assert!(band.contains(&lingering));
        assert_eq!(streamer.state(lingering), ChunkState::Meshed);

        let evicted = streamer.set_seed(11);
        assert_eq!(evicted, band);
        assert!(!streamer.store().contains(lingering));
        for coord in streamer.store().coords() {
            assert!(coord.distance_squared(moved) <= 4);
            assert_eq!(streamer.state(coord), ChunkState::Queued);
        }

        run_until_idle(&mut streamer, moved.center(64.0));
        let generator = TerrainGenerator::new(streamer.config().terrain.clone());
        assert_eq!(streamer.resident_count(), 13);
        for coord in streamer.store().coords() {
            assert_eq!(streamer.state(coord), ChunkState::Meshed);
            let chunk = streamer.store().try_get(coord).unwrap().get();
            assert!(chunk.voxels() == &generator.generate(coord).unwrap()[..]);
        }
    }

    #[test]
    fn observer_at_the_edge_of_the_world_is_clamped() {
        let mut streamer = ChunkStreamer::new(small_config(2)).unwrap();
        let observer = Point3::new(f32::MAX, 64.0, -3.0e9);
        run_until_idle(&mut streamer, observer);

        let center = ChunkCoord::new(MAX_OBSERVER_CHUNK, -MAX_OBSERVER_CHUNK);
        assert_eq!(streamer.observer_chunk(), Some(center));
        assert_eq!(streamer.resident_count(), 13);
        for coord in streamer.store().coords() {
            assert!(coord.distance_squared(center) <= 4);
            assert_eq!(streamer.state(coord), ChunkState::Meshed);
        }
        let far_corner = center.offset(2, 0).world_pos(LocalPos::new(15, 0, 15).unwrap());
        assert!(streamer.occupancy().is_solid(far_corner));
    }
}
