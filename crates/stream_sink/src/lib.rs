//! # Stream Sink
//!
//! Buffered, failover-capable delivery of opaque events to append-only
//! stream destinations.
//!
//! Responsible for:
//! - Accumulating events until a size or time threshold is reached
//! - Writing batches to the primary destination, retrying rejected events
//! - Failing over to a secondary destination with stricter request limits
//! - Tracking destination health for the host process

pub mod accumulator;
pub mod backoff;
pub mod destinations;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod metrics;
pub mod scheduler;
pub mod sink;
pub mod splitter;

pub use accumulator::{Accumulator, BufferLimits};
pub use backoff::{BackoffPolicy, BackoffState};
pub use contracts::{Destination, Event, WriteOutcome};
pub use destinations::{create_destination, AnyDestination, FileDestination, LogDestination};
pub use dispatcher::{summarize_failures, Dispatcher, FailureSummary};
pub use error::SinkError;
pub use health::HealthTracker;
pub use metrics::{DestinationMetrics, MetricsSnapshot};
pub use sink::{EventSink, EventSinkBuilder, ShutdownReport};
