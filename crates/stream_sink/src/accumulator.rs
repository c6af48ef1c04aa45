//! In-memory event accumulator with size-triggered flush.
//!
//! All pending state sits behind one mutex. Flushed batches are returned to
//! the caller, never dispatched while the lock is held.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::{Batch, BufferConfig, Event};
use tokio::time::Instant;

use crate::scheduler::{plan_tick, TickPlan};

/// Flush thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLimits {
    pub byte_limit: usize,
    pub record_limit: usize,
}

impl From<&BufferConfig> for BufferLimits {
    fn from(config: &BufferConfig) -> Self {
        Self {
            byte_limit: config.byte_limit,
            record_limit: config.record_limit,
        }
    }
}

struct BufferState {
    pending: Vec<Event>,
    byte_count: usize,
    last_flush: Instant,
}

impl BufferState {
    /// Whether adding `event` would cross a threshold
    ///
    /// An empty buffer always accepts, so an oversized event stands alone.
    fn would_overflow(&self, event: &Event, limits: BufferLimits) -> bool {
        !self.pending.is_empty()
            && (self.pending.len() + 1 > limits.record_limit
                || self.byte_count + event.size() > limits.byte_limit)
    }

    fn push(&mut self, event: Event) {
        self.byte_count += event.size();
        self.pending.push(event);
    }

    fn take(&mut self) -> Option<Batch> {
        let batch = std::mem::take(&mut self.pending);
        self.byte_count = 0;
        self.last_flush = Instant::now();
        (!batch.is_empty()).then_some(batch)
    }
}

/// Pending events awaiting dispatch
pub struct Accumulator {
    limits: BufferLimits,
    state: Mutex<BufferState>,
}

impl fmt::Debug for Accumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Accumulator")
            .field("pending", &state.pending.len())
            .field("byte_count", &state.byte_count)
            .field("limits", &self.limits)
            .finish()
    }
}

impl Accumulator {
    pub fn new(limits: BufferLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(BufferState {
                pending: Vec::new(),
                byte_count: 0,
                last_flush: Instant::now(),
            }),
        }
    }

    pub fn limits(&self) -> BufferLimits {
        self.limits
    }

    /// Add one event
    ///
    /// Returns the batch that had to be flushed first to make room, if any.
    pub fn store(&self, event: Event) -> Option<Batch> {
        let mut state = self.lock();
        let flushed = if state.would_overflow(&event, self.limits) {
            state.take()
        } else {
            None
        };
        state.push(event);
        flushed
    }

    /// Add a sequence of events under a single lock
    ///
    /// Returns every batch the thresholds forced out, oldest first.
    pub fn store_all(&self, events: impl IntoIterator<Item = Event>) -> Vec<Batch> {
        let mut state = self.lock();
        let mut flushed = Vec::new();
        for event in events {
            if state.would_overflow(&event, self.limits) {
                flushed.extend(state.take());
            }
            state.push(event);
        }
        flushed
    }

    /// Take everything pending and restart the flush clock
    ///
    /// Returns `None` when nothing was pending.
    pub fn flush(&self) -> Option<Batch> {
        self.lock().take()
    }

    /// Flush only if `time_limit` has passed since the last flush
    ///
    /// The check and the swap happen under one lock, so a flush that lands
    /// just before this call pushes the deadline out. Returns the batch, if
    /// any, and the wait until the next flush is due.
    pub fn flush_if_elapsed(&self, time_limit: Duration) -> (Option<Batch>, Duration) {
        let mut state = self.lock();
        match plan_tick(state.last_flush.elapsed(), time_limit) {
            TickPlan::Flush => (state.take(), time_limit),
            TickPlan::Wait(remaining) => (None, remaining),
        }
    }

    /// When the buffer was last flushed
    pub fn last_flush(&self) -> Instant {
        self.lock().last_flush
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn byte_count(&self) -> usize {
        self.lock().byte_count
    }

    // Every mutation leaves the state consistent before it can panic.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
