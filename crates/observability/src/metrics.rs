//! Stream sink metrics
//!
//! Thin wrappers over the `metrics` facade so metric names and labels live in one place.
//! Without an installed recorder every call is a no-op.

use contracts::DestinationRole;
use metrics::{counter, gauge, histogram};

/// Why a batch left the accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Record or byte threshold reached
    Size,
    /// Flush timer fired
    Timer,
    /// Explicit flush request
    Manual,
    /// Final flush during shutdown
    Shutdown,
}

impl FlushTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Size => "size",
            Self::Timer => "timer",
            Self::Manual => "manual",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Record events accepted by `store`
pub fn record_events_stored(count: usize) {
    counter!("stream_sink_events_stored_total").increment(count as u64);
}

/// Record a batch leaving the accumulator
pub fn record_batch_flushed(trigger: FlushTrigger, records: usize, bytes: usize) {
    counter!(
        "stream_sink_batches_flushed_total",
        "trigger" => trigger.as_str()
    )
    .increment(1);
    histogram!("stream_sink_batch_records").record(records as f64);
    histogram!("stream_sink_batch_bytes").record(bytes as f64);
}

/// Record the per-event result of one write attempt
pub fn record_records_written(role: DestinationRole, succeeded: usize, failed: usize) {
    if succeeded > 0 {
        counter!(
            "stream_sink_records_written_total",
            "destination" => role.as_str(),
            "status" => "success"
        )
        .increment(succeeded as u64);
    }
    if failed > 0 {
        counter!(
            "stream_sink_records_written_total",
            "destination" => role.as_str(),
            "status" => "failure"
        )
        .increment(failed as u64);
    }
}

/// Record a request-level write failure
pub fn record_request_failure(role: DestinationRole) {
    counter!(
        "stream_sink_request_failures_total",
        "destination" => role.as_str()
    )
    .increment(1);
}

/// Record a scheduled retry and its delay
pub fn record_retry_scheduled(role: DestinationRole, delay_ms: f64) {
    counter!("stream_sink_retries_total", "destination" => role.as_str()).increment(1);
    histogram!("stream_sink_retry_delay_ms", "destination" => role.as_str()).record(delay_ms);
}

/// Record a failover between destinations
pub fn record_failover(from: DestinationRole, to: DestinationRole) {
    counter!(
        "stream_sink_failovers_total",
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
}

/// Record a destination health flag
pub fn record_destination_health(role: DestinationRole, healthy: bool) {
    gauge!(
        "stream_sink_destination_healthy",
        "destination" => role.as_str()
    )
    .set(if healthy { 1.0 } else { 0.0 });
}

/// Record events dropped because shutdown's grace period ran out
pub fn record_events_abandoned(count: usize) {
    counter!("stream_sink_events_abandoned_total").increment(count as u64);
}
