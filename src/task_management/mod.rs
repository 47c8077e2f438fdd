//! # Task Management System
//!
//! A small worker pool: a task queue on the update thread, one channel pair per worker, and a
//! results queue drained once per tick.
//!
//! ## Architecture Overview
//! - `TaskManager`: owns the workers, distributes tasks round-robin and collects outputs
//! - `Task`: a unit of work with a typed output
//! - `TaskChannel`: the task sender / result receiver pair of one worker thread
//!
//! ## Task Lifecycle
//! 1. Tasks are published via `TaskManager::publish_task()`
//! 2. A free worker receives the task, or it waits in the queue
//! 3. Workers process tasks and send the outputs back
//! 4. The update thread calls `process_queued_tasks()` and `drain_completed()` each tick
//!
//! With zero workers every task is processed inline at publish time and its output is returned
//! by the next `drain_completed()`, which keeps single-threaded runs deterministic.

pub mod task;

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use log::{error, info};

use crate::error::VoxelResult;
pub use task::Task;

/// Maximum number of tasks that can be in flight per worker channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 1;

/// Communication channel between the update thread and one worker thread.
struct TaskChannel<T: Task> {
    task_sender: Option<Sender<T>>,
    result_receiver: Receiver<T::Output>,
    num_tasks_in_flight: usize,
    disconnected: bool,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
pub struct TaskManager<T: Task> {
    channels: Vec<TaskChannel<T>>,
    queued_tasks: VecDeque<T>,
    inline_results: VecDeque<T::Output>,
    current_channel: usize,
}

impl<T: Task> TaskManager<T> {
    /// Creates a manager with `num_workers` threads. Zero means inline processing.
    ///
    /// # Errors
    /// `Io` if a worker thread cannot be spawned.
    pub fn new(num_workers: usize) -> VoxelResult<Self> {
        let mut channels = Vec::with_capacity(num_workers);

        for worker_index in 0..num_workers {
            let (task_tx, task_rx) = channel::<T>();
            let (result_tx, result_rx) = channel::<T::Output>();

            let worker = thread::Builder::new()
                .name(format!("chunk-worker-{worker_index}"))
                .spawn(move || {
                    while let Ok(task) = task_rx.recv() {
                        if result_tx.send(task.process()).is_err() {
                            break;
                        }
                    }
                })?;

            channels.push(TaskChannel {
                task_sender: Some(task_tx),
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                disconnected: false,
                worker: Some(worker),
            });
        }

        if num_workers > 0 {
            info!(
                "Started {num_workers} chunk workers (available parallelism: {:?})",
                thread::available_parallelism()
            );
        }

        Ok(TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            inline_results: VecDeque::new(),
            current_channel: 0,
        })
    }

    /// Number of worker threads; zero in inline mode.
    pub fn worker_count(&self) -> usize {
        self.channels.len()
    }

    fn try_send_task(&mut self, task: T, channel_idx: usize) -> Result<(), T> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = channel.task_sender.as_ref() else {
            return Err(task);
        };
        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(err) => {
                error!("Chunk worker {channel_idx} is gone; task requeued");
                channel.disconnected = true;
                Err(err.0)
            }
        }
    }

    /// Finds a live channel below `MAX_TASKS_IN_FLIGHT`, round-robin from the last one used.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|offset| (self.current_channel + offset) % count)
            .find(|&idx| {
                let channel = &self.channels[idx];
                !channel.disconnected && channel.num_tasks_in_flight < MAX_TASKS_IN_FLIGHT
            })
    }

    /// Hands a task to a free worker, queues it if none is free, or runs it immediately when
    /// there are no workers. Returns `true` if the task started.
    pub fn publish_task(&mut self, task: T) -> bool {
        if self.channels.is_empty() {
            self.inline_results.push_back(task.process());
            return true;
        }

        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Moves queued tasks onto workers that have become free.
    pub fn process_queued_tasks(&mut self) {
        while !self.queued_tasks.is_empty() {
            let Some(channel_idx) = self.find_available_channel() else {
                break;
            };
            let Some(task) = self.queued_tasks.pop_front() else {
                break;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(()) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => self.queued_tasks.push_front(task),
            }
        }
    }

    /// Collects every output that has arrived since the last call. Never blocks.
    pub fn drain_completed(&mut self) -> Vec<T::Output> {
        let mut completed: Vec<T::Output> = self.inline_results.drain(..).collect();
        for (idx, channel) in self.channels.iter_mut().enumerate() {
            loop {
                match channel.result_receiver.try_recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight = channel.num_tasks_in_flight.saturating_sub(1);
                        completed.push(result);
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        if !channel.disconnected {
                            error!(
                                "Chunk worker {idx} stopped with {} tasks in flight",
                                channel.num_tasks_in_flight
                            );
                            channel.disconnected = true;
                        }
                        break;
                    }
                }
            }
        }
        completed
    }

    /// Tasks sent to workers whose output has not been drained yet.
    pub fn in_flight(&self) -> usize {
        self.channels.iter().map(|c| c.num_tasks_in_flight).sum::<usize>() + self.inline_results.len()
    }

    /// Tasks waiting for a free worker.
    pub fn queued(&self) -> usize {
        self.queued_tasks.len()
    }

    /// Tasks that can be published right now without waiting in the queue. Unbounded in inline
    /// mode.
    pub fn free_slots(&self) -> usize {
        if self.channels.is_empty() {
            return usize::MAX;
        }
        let free: usize = self
            .channels
            .iter()
            .filter(|channel| !channel.disconnected)
            .map(|channel| MAX_TASKS_IN_FLIGHT.saturating_sub(channel.num_tasks_in_flight))
            .sum();
        free.saturating_sub(self.queued_tasks.len())
    }

    /// Drops queued tasks for which `keep` returns `false` and returns how many were dropped.
    /// Tasks already handed to a worker are unaffected.
    pub fn retain_queued(&mut self, mut keep: impl FnMut(&T) -> bool) -> usize {
        let before = self.queued_tasks.len();
        self.queued_tasks.retain(|task| keep(task));
        before - self.queued_tasks.len()
    }

    /// `true` when nothing is queued, running or waiting to be drained.
    pub fn is_idle(&self) -> bool {
        self.queued() == 0 && self.in_flight() == 0
    }
}

impl<T: Task> Drop for TaskManager<T> {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("Chunk worker panicked during shutdown");
                }
            }
        }
    }
}
