//! Chunk work units executed by the task manager.
//!
//! Every task names its chunk coordinate and the ticket it was dispatched with. Panics inside the
//! work are caught here and reported as ordinary failures, so a bad chunk never takes a worker
//! thread down with it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use web_time::Instant;

use crate::core::MtResource;
use crate::error::{VoxelError, VoxelResult};
use crate::generation::TerrainGenerator;
use crate::meshing::{ChunkNeighborhood, MeshBuilder, MeshData};
use crate::persistence::ChunkPersistence;
use crate::task_management::Task;
use crate::world::block::Voxel;
use crate::world::chunk::{Chunk, ChunkCoord};

/// What a task does.
pub(crate) enum ChunkWork {
    /// Load from persistence if available, otherwise generate terrain.
    Generate {
        generator: Arc<TerrainGenerator>,
        persistence: Option<Arc<dyn ChunkPersistence>>,
    },
    /// Snapshot the chunk and its neighbors, then mesh.
    Mesh {
        center: MtResource<Chunk>,
        neighbors: [Option<MtResource<Chunk>>; 4],
    },
}

#[cfg(test)]
thread_local! {
    /// Mesh tasks for this chunk panic when run on the current thread.
    pub(crate) static FAULTY_MESH: std::cell::Cell<Option<ChunkCoord>> =
        const { std::cell::Cell::new(None) };
}

pub(crate) struct ChunkTask {
    pub coord: ChunkCoord,
    pub ticket: u64,
    pub work: ChunkWork,
}

pub(crate) enum ChunkOutcome {
    Generated { voxels: Box<[Voxel]>, loaded: bool },
    Meshed { mesh: MeshData, revision: u64 },
    Failed(VoxelError),
}

pub(crate) struct ChunkTaskResult {
    pub coord: ChunkCoord,
    pub ticket: u64,
    pub elapsed: Duration,
    pub outcome: ChunkOutcome,
}

impl ChunkWork {
    fn run(self, coord: ChunkCoord) -> VoxelResult<ChunkOutcome> {
        match self {
            ChunkWork::Generate {
                generator,
                persistence,
            } => {
                if let Some(persistence) = persistence {
                    if let Some(voxels) = persistence.try_load(coord)? {
                        return Ok(ChunkOutcome::Generated {
                            voxels,
                            loaded: true,
                        });
                    }
                }
                Ok(ChunkOutcome::Generated {
                    voxels: generator.generate(coord)?,
                    loaded: false,
                })
            }
            ChunkWork::Mesh { center, neighbors } => {
                #[cfg(test)]
                if FAULTY_MESH.with(|faulty| faulty.get()) == Some(coord) {
                    panic!("mesh fault in chunk {coord}");
                }
                let neighborhood = ChunkNeighborhood::capture(&center, neighbors)?;
                drop(center);
                Ok(ChunkOutcome::Meshed {
                    mesh: MeshBuilder::build(&neighborhood)?,
                    revision: neighborhood.revision(),
                })
            }
        }
    }

    fn kind(&self) -> WorkKind {
        match self {
            ChunkWork::Generate { .. } => WorkKind::Generate,
            ChunkWork::Mesh { .. } => WorkKind::Mesh,
        }
    }
}

#[derive(Copy, Clone)]
enum WorkKind {
    Generate,
    Mesh,
}

impl WorkKind {
    fn failure(self, coord: ChunkCoord, reason: String) -> VoxelError {
        match self {
            WorkKind::Generate => VoxelError::GenerationFailure { coord, reason },
            WorkKind::Mesh => VoxelError::MeshBuildFailure { coord, reason },
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

impl Task for ChunkTask {
    type Output = ChunkTaskResult;

    fn process(self) -> ChunkTaskResult {
        let start = Instant::now();
        let ChunkTask {
            coord,
            ticket,
            work,
        } = self;
        let kind = work.kind();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| work.run(coord))) {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(
                err @ (VoxelError::GenerationFailure { .. } | VoxelError::MeshBuildFailure { .. }),
            )) => ChunkOutcome::Failed(err),
            Ok(Err(err)) => ChunkOutcome::Failed(kind.failure(coord, err.to_string())),
            Err(payload) => {
                ChunkOutcome::Failed(kind.failure(coord, panic_message(payload.as_ref())))
            }
        };

        ChunkTaskResult {
            coord,
            ticket,
            elapsed: start.elapsed(),
            outcome,
        }
    }
}
