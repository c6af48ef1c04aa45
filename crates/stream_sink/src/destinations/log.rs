//! LogDestination - logs batch summaries via tracing

use contracts::{ContractError, Destination, Event, WriteOutcome};
use tracing::{info, instrument};

/// Destination that accepts everything and logs what it saw
pub struct LogDestination {
    name: String,
}

impl LogDestination {
    /// Create a new LogDestination with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_batch_summary(&self, events: &[Event]) {
        let bytes: usize = events.iter().map(Event::size).sum();
        let first_key = events.first().map(|e| e.partition_key.as_str());

        info!(
            destination = %self.name,
            events = events.len(),
            bytes,
            first_key,
            "Batch received"
        );
    }
}

impl Destination for LogDestination {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_destination_write",
        skip(self, events),
        fields(destination = %self.name, events = events.len())
    )]
    async fn write(&self, events: &[Event]) -> WriteOutcome {
        self.log_batch_summary(events);
        WriteOutcome::success(events.len())
    }

    async fn probe(&self) -> Result<(), ContractError> {
        Ok(())
    }
}
