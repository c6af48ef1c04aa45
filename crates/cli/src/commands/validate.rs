//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::{CredentialsMode, DestinationKind, SinkConfig};

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    primary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    secondary: Option<String>,
    credentials: String,
    record_limit: usize,
    byte_limit: usize,
    time_limit_ms: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &SinkConfig) -> ConfigSummary {
    let credentials = match config.credentials.resolve() {
        Ok(CredentialsMode::Default) => "default",
        Ok(CredentialsMode::Iam) => "iam",
        Ok(CredentialsMode::Env) => "env",
        Ok(CredentialsMode::Static { .. }) => "static",
        Err(_) => "invalid",
    };

    ConfigSummary {
        version: format!("{:?}", config.version),
        primary: format!("{} ({:?})", config.primary.name, config.primary.kind),
        secondary: config
            .secondary
            .as_ref()
            .map(|s| format!("{} ({:?})", s.destination.name, s.destination.kind)),
        credentials: credentials.to_string(),
        record_limit: config.buffer.record_limit,
        byte_limit: config.buffer.byte_limit,
        time_limit_ms: config.buffer.time_limit_ms,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &SinkConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.secondary.is_none() {
        warnings.push(
            "No secondary destination - exhausted retries keep retrying the primary at max backoff"
                .to_string(),
        );
    }

    if config.primary.kind == DestinationKind::Log {
        warnings.push(format!(
            "Primary '{}' is a log destination - events are not persisted",
            config.primary.name
        ));
    }

    if config.shutdown.grace_period_ms < config.backoff.min_backoff_ms {
        warnings.push(
            "shutdown.grace_period_ms is below min_backoff_ms - any retry pending at shutdown will be abandoned"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Primary: {}", summary.primary);
            if let Some(ref secondary) = summary.secondary {
                println!("  Secondary: {}", secondary);
            }
            println!("  Credentials: {}", summary.credentials);
            println!(
                "  Buffer: {} records / {} bytes / {} ms",
                summary.record_limit, summary.byte_limit, summary.time_limit_ms
            );
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
