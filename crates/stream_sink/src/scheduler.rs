//! Flush timer
//!
//! Wakes at the point the time threshold would actually be reached, measured
//! from the accumulator's last flush. A size-triggered flush in between pushes
//! the next wake-up out instead of causing an early timer flush.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use contracts::Batch;

use crate::accumulator::Accumulator;

/// What the timer does on a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPlan {
    /// Threshold reached: flush, then sleep a full `time_limit`
    Flush,
    /// Threshold not yet reached: sleep the remainder
    Wait(Duration),
}

/// Decide a tick given the time since the last flush
pub fn plan_tick(elapsed: Duration, time_limit: Duration) -> TickPlan {
    if elapsed >= time_limit {
        TickPlan::Flush
    } else {
        TickPlan::Wait(time_limit - elapsed)
    }
}

/// Run the flush timer until `cancel` fires
///
/// `flush` dispatches each batch the timer takes.
#[instrument(name = "flush_timer", skip(accumulator, cancel, flush))]
pub async fn run_flush_timer<F>(
    accumulator: Arc<Accumulator>,
    time_limit: Duration,
    cancel: CancellationToken,
    flush: F,
) where
    F: Fn(Batch) + Send,
{
    debug!("Flush timer started");

    loop {
        let (batch, wait) = accumulator.flush_if_elapsed(time_limit);
        if let Some(batch) = batch {
            flush(batch);
        }

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => break,
        }
    }

    debug!("Flush timer stopped");
}
