//! Destination implementations
//!
//! Contains LogDestination and FileDestination, plus the config-driven factory.

mod file;
mod log;

use contracts::{ContractError, Destination, DestinationConfig, DestinationKind, Event, WriteOutcome};
use tracing::instrument;

use crate::error::SinkError;

pub use self::file::{FileDestination, FileDestinationConfig, RECORD_TOO_LARGE};
pub use self::log::LogDestination;

/// Any built-in destination, chosen at runtime from configuration
pub enum AnyDestination {
    Log(LogDestination),
    File(FileDestination),
}

impl Destination for AnyDestination {
    fn name(&self) -> &str {
        match self {
            Self::Log(d) => d.name(),
            Self::File(d) => d.name(),
        }
    }

    async fn write(&self, events: &[Event]) -> WriteOutcome {
        match self {
            Self::Log(d) => d.write(events).await,
            Self::File(d) => d.write(events).await,
        }
    }

    async fn probe(&self) -> Result<(), ContractError> {
        match self {
            Self::Log(d) => d.probe().await,
            Self::File(d) => d.probe().await,
        }
    }
}

/// Create a destination from configuration
#[instrument(
    name = "create_destination",
    skip(config),
    fields(destination = %config.name, kind = ?config.kind)
)]
pub fn create_destination(config: &DestinationConfig) -> Result<AnyDestination, SinkError> {
    match config.kind {
        DestinationKind::Log => Ok(AnyDestination::Log(LogDestination::new(&config.name))),
        DestinationKind::File => {
            let destination = FileDestination::from_params(&config.name, &config.params)
                .map_err(|e| SinkError::destination_creation(&config.name, e.to_string()))?;
            Ok(AnyDestination::File(destination))
        }
    }
}
