//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use contracts::SinkConfig;
use stream_sink::{create_destination, AnyDestination, EventSink, EventSinkBuilder};

use crate::cli::RunArgs;
use crate::stats::RunStats;

/// Execute the `run` command
pub async fn run_sink(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        primary = %config.primary.name,
        secondary = config.secondary.as_ref().map(|s| s.destination.name.as_str()),
        record_limit = config.buffer.record_limit,
        byte_limit = config.buffer.byte_limit,
        time_limit_ms = config.buffer.time_limit_ms,
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let sink = build_sink(config).context("Failed to build sink")?;

    let started = Instant::now();
    let events_read = pump_stdin(&sink, args).await?;

    let report = sink.shutdown().await;
    let stats = RunStats {
        events_read,
        duration: started.elapsed(),
        drained: report.drained,
        destinations: report.metrics,
    };

    info!(
        events_read = stats.events_read,
        delivered = stats.delivered(),
        drained = stats.drained,
        duration_secs = stats.duration.as_secs_f64(),
        "Stream sink finished"
    );
    stats.print_summary();

    Ok(())
}

/// Create destinations from configuration and start the sink
fn build_sink(config: SinkConfig) -> Result<EventSink<AnyDestination>> {
    let primary = create_destination(&config.primary)?;
    let secondary = config
        .secondary
        .as_ref()
        .map(|s| create_destination(&s.destination))
        .transpose()?;

    let builder = EventSinkBuilder::new(config, primary);
    let sink = match secondary {
        Some(secondary) => builder.secondary(secondary).build()?,
        None => builder.build()?,
    };
    Ok(sink)
}

/// Store stdin lines until EOF or a shutdown signal
///
/// Returns the number of events handed to the sink.
async fn pump_stdin(sink: &EventSink<AnyDestination>, args: &RunArgs) -> Result<u64> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown_signal = setup_shutdown_signal();
    tokio::pin!(shutdown_signal);

    let mut events_read: u64 = 0;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    info!(events_read, "Input closed");
                    break;
                };
                if args.skip_empty && line.is_empty() {
                    continue;
                }
                sink.store_raw_events([line], &args.partition_key);
                events_read += 1;
            }
            _ = &mut shutdown_signal => {
                warn!(events_read, "Received shutdown signal, stopping");
                break;
            }
        }
    }

    Ok(events_read)
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &SinkConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Buffer:");
    println!("  Byte limit: {}", config.buffer.byte_limit);
    println!("  Record limit: {}", config.buffer.record_limit);
    println!("  Time limit: {} ms", config.buffer.time_limit_ms);

    println!("\nBackoff:");
    println!(
        "  Delay: {}..{} ms",
        config.backoff.min_backoff_ms, config.backoff.max_backoff_ms
    );
    println!("  Max retries: {}", config.backoff.max_retries);

    println!("\nDestinations:");
    println!(
        "  - primary: {} ({:?})",
        config.primary.name, config.primary.kind
    );
    if let Some(ref secondary) = config.secondary {
        println!(
            "  - secondary: {} ({:?}), {} records / {} bytes per request",
            secondary.destination.name,
            secondary.destination.kind,
            secondary.max_records_per_request,
            secondary.max_bytes_per_request
        );
    }

    println!();
}
