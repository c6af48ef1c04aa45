//! Event, Batch and WriteOutcome - the data that flows through the sink

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single opaque event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Raw payload (zero-copy)
    pub payload: Bytes,

    /// Key used by the destination to shard the event
    pub partition_key: String,
}

impl Event {
    /// Create a new event
    pub fn new(payload: impl Into<Bytes>, partition_key: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            partition_key: partition_key.into(),
        }
    }

    /// Size in bytes, as counted against buffer and request limits
    #[inline]
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Ordered group of events flushed together
pub type Batch = Vec<Event>;

/// Which of the two destinations a batch targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationRole {
    Primary,
    Secondary,
}

impl DestinationRole {
    /// The opposite role
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for DestinationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-event rejection reported by a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Destination error code (e.g. "ProvisionedThroughputExceededException")
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl RecordFailure {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Per-event result inside a [`WriteOutcome::Partial`]
pub type RecordOutcome = Result<(), RecordFailure>;

/// Result of one write request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The request itself failed; every event in it is considered failed
    TotalFailure { message: String },

    /// The request went through; one outcome per event, in request order
    Partial(Vec<RecordOutcome>),
}

impl WriteOutcome {
    /// All `count` events accepted
    pub fn success(count: usize) -> Self {
        Self::Partial(vec![Ok(()); count])
    }

    /// Request-level failure
    pub fn total_failure(message: impl Into<String>) -> Self {
        Self::TotalFailure {
            message: message.into(),
        }
    }

    /// True when the destination answered the request
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Partial(_))
    }

    /// Number of rejected events, `None` for a request-level failure
    pub fn rejected_count(&self) -> Option<usize> {
        match self {
            Self::TotalFailure { .. } => None,
            Self::Partial(outcomes) => Some(outcomes.iter().filter(|o| o.is_err()).count()),
        }
    }
}
