//! # Task Definitions
//!
//! A [`Task`] is a self-contained unit of work that is moved to a worker, processed there, and
//! answered with an [`Task::Output`] that travels back to the update thread. Outputs carry
//! whatever key the caller needs to match them up; the pool makes no ordering promise across
//! tasks.

/// Work that can run on a worker thread.
pub trait Task: Send + 'static {
    /// Value sent back to the update thread.
    type Output: Send + 'static;

    /// Performs the work. Runs on a worker thread, or inline when the pool has no workers.
    fn process(self) -> Self::Output;
}
