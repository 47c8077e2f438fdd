//! Min-priority request queue with FIFO tie-breaking.
//!
//! Requests live in a `BinaryHeap`; re-prioritizing or removing a coordinate leaves the old heap
//! entry in place and records the live `(priority, seq)` in a map, and stale entries are skipped
//! when popped. A coordinate keeps the sequence number of its first insertion, so among equal
//! priorities the oldest request wins.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::world::chunk::ChunkCoord;

#[derive(Debug, PartialEq, Eq)]
struct StreamingRequest {
    priority: i64,
    seq: u64,
    coord: ChunkCoord,
}

impl Ord for StreamingRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the max-heap yields the lowest priority, then the lowest seq.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for StreamingRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pending chunk requests ordered by priority (lower first).
#[derive(Debug, Default)]
pub struct RequestQueue {
    heap: BinaryHeap<StreamingRequest>,
    live: HashMap<ChunkCoord, (i64, u64)>,
    next_seq: u64,
}

impl RequestQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a request or updates the priority of an existing one.
    pub fn upsert(&mut self, coord: ChunkCoord, priority: i64) {
        let seq = match self.live.get(&coord) {
            Some(&(current, _)) if current == priority => return,
            Some(&(_, seq)) => seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.live.insert(coord, (priority, seq));
        self.heap.push(StreamingRequest {
            priority,
            seq,
            coord,
        });
        self.compact_if_needed();
    }

    /// Removes and returns the most urgent request.
    pub fn pop(&mut self) -> Option<(ChunkCoord, i64)> {
        while let Some(request) = self.heap.pop() {
            if self.live.get(&request.coord) == Some(&(request.priority, request.seq)) {
                self.live.remove(&request.coord);
                return Some((request.coord, request.priority));
            }
        }
        None
    }

    /// Drops the request for `coord`, if any.
    pub fn remove(&mut self, coord: ChunkCoord) -> bool {
        self.live.remove(&coord).is_some()
    }

    /// Keeps only requests whose coordinate satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(ChunkCoord) -> bool) {
        self.live.retain(|&coord, _| keep(coord));
        self.compact_if_needed();
    }

    /// `true` if `coord` has a pending request.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.live.contains_key(&coord)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drops every request.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.live.clear();
    }

    fn compact_if_needed(&mut self) {
        if self.heap.len() <= self.live.len() * 4 + 64 {
            return;
        }
        self.heap = self
            .live
            .iter()
            .map(|(&coord, &(priority, seq))| StreamingRequest {
                priority,
                seq,
                coord,
            })
            .collect();
    }
}
