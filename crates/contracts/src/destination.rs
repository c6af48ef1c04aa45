//! Destination trait - the write side of the sink
//!
//! Defines the abstract interface for the append-only stream services
//! the sink delivers batches to.

use crate::{ContractError, Event, WriteOutcome};

/// Append-only stream service
///
/// Writes may be issued concurrently from several retry sequences,
/// so every method takes `&self`.
#[trait_variant::make(Destination: Send)]
pub trait LocalDestination {
    /// Destination name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one request worth of events
    ///
    /// Request-level errors are reported as [`WriteOutcome::TotalFailure`];
    /// per-event rejections as entries of [`WriteOutcome::Partial`].
    async fn write(&self, events: &[Event]) -> WriteOutcome;

    /// Lightweight reachability check
    ///
    /// # Errors
    /// Returns the reason the destination cannot be reached
    async fn probe(&self) -> Result<(), ContractError>;
}
