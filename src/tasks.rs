//! Buffered relay tasks
//!
//! Commands arriving as JSON `type=command` frames are queued rather than
//! applied immediately and drained on the heartbeat cadence. The queue is a
//! bounded FIFO; processed entries are compacted away in place, preserving
//! the relative order of unprocessed entries.

use crate::relay::RelayBank;
use std::time::Instant;
use tracing::warn;

/// One buffered relay task
#[derive(Debug, Clone)]
pub struct PendingTask {
    pub task_id: String,
    pub channel: usize,
    pub on: bool,
    pub enqueued_at: Instant,
    pub processed: bool,
}

/// Bounded FIFO of pending relay tasks
pub struct TaskQueue {
    items: Vec<PendingTask>,
    capacity: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueue a task. A full queue drops the task (logged, not fatal).
    pub fn push(&mut self, task_id: String, channel: usize, on: bool, now: Instant) -> bool {
        if self.items.len() >= self.capacity {
            warn!("task queue full, dropping task {}", task_id);
            return false;
        }
        self.items.push(PendingTask {
            task_id,
            channel,
            on,
            enqueued_at: now,
            processed: false,
        });
        true
    }

    /// Run every unprocessed task through the relay gate, then compact.
    ///
    /// Returns the `(channel, state)` pairs that were actually applied.
    pub fn process(&mut self, relays: &mut RelayBank, now: Instant) -> Vec<(usize, bool)> {
        let mut applied = Vec::new();

        for task in self.items.iter_mut().filter(|t| !t.processed) {
            match relays.set(task.channel, task.on, now) {
                Ok(true) => applied.push((task.channel, task.on)),
                Ok(false) => {} // debounced or bad index; the task is still consumed
                Err(e) => warn!("task {} failed to drive relay: {}", task.task_id, e),
            }
            task.processed = true;
        }

        self.items.retain(|t| !t.processed);
        applied
    }
}
