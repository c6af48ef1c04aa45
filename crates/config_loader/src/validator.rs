//! Configuration validation
//!
//! Rules:
//! - buffer thresholds > 0
//! - min_backoff_ms <= max_backoff_ms, min_backoff_ms > 0, max_retries > 0
//! - startup check interval > 0
//! - destination names non-empty and distinct
//! - secondary request limits > 0
//! - credential special values appear in both keys or neither

use contracts::{ContractError, DestinationConfig, SinkConfig};

/// Validate a SinkConfig
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &SinkConfig) -> Result<(), ContractError> {
    validate_buffer(config)?;
    validate_backoff(config)?;
    validate_startup(config)?;
    validate_destinations(config)?;
    config.credentials.resolve()?;
    Ok(())
}

fn validate_buffer(config: &SinkConfig) -> Result<(), ContractError> {
    let buffer = &config.buffer;
    if buffer.byte_limit == 0 {
        return Err(ContractError::config_validation(
            "buffer.byte_limit",
            "byte_limit must be > 0",
        ));
    }
    if buffer.record_limit == 0 {
        return Err(ContractError::config_validation(
            "buffer.record_limit",
            "record_limit must be > 0",
        ));
    }
    if buffer.time_limit_ms == 0 {
        return Err(ContractError::config_validation(
            "buffer.time_limit_ms",
            "time_limit_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_backoff(config: &SinkConfig) -> Result<(), ContractError> {
    let backoff = &config.backoff;
    if backoff.min_backoff_ms == 0 {
        return Err(ContractError::config_validation(
            "backoff.min_backoff_ms",
            "min_backoff_ms must be > 0",
        ));
    }
    if backoff.max_retries == 0 {
        return Err(ContractError::config_validation(
            "backoff.max_retries",
            "max_retries must be > 0",
        ));
    }
    if backoff.min_backoff_ms > backoff.max_backoff_ms {
        return Err(ContractError::config_validation(
            "backoff.min_backoff_ms / backoff.max_backoff_ms",
            format!(
                "min_backoff_ms ({}) must be <= max_backoff_ms ({})",
                backoff.min_backoff_ms, backoff.max_backoff_ms
            ),
        ));
    }
    Ok(())
}

fn validate_startup(config: &SinkConfig) -> Result<(), ContractError> {
    if config.startup.check_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "startup.check_interval_ms",
            "check_interval_ms must be > 0",
        ));
    }
    Ok(())
}

fn validate_destinations(config: &SinkConfig) -> Result<(), ContractError> {
    validate_destination_name("primary.name", &config.primary)?;

    let Some(secondary) = &config.secondary else {
        return Ok(());
    };

    validate_destination_name("secondary.name", &secondary.destination)?;

    if secondary.destination.name == config.primary.name {
        return Err(ContractError::config_validation(
            "secondary.name",
            format!(
                "secondary destination '{}' duplicates the primary",
                secondary.destination.name
            ),
        ));
    }
    if secondary.max_records_per_request == 0 {
        return Err(ContractError::config_validation(
            "secondary.max_records_per_request",
            "max_records_per_request must be > 0",
        ));
    }
    if secondary.max_bytes_per_request == 0 {
        return Err(ContractError::config_validation(
            "secondary.max_bytes_per_request",
            "max_bytes_per_request must be > 0",
        ));
    }
    Ok(())
}

fn validate_destination_name(
    field: &str,
    destination: &DestinationConfig,
) -> Result<(), ContractError> {
    if destination.name.trim().is_empty() {
        return Err(ContractError::config_validation(
            field,
            "destination name cannot be empty",
        ));
    }
    Ok(())
}
