//! EventSink - the facade producers talk to
//!
//! Wires the accumulator, flush timer, dispatcher and health probes together.

use std::sync::Arc;

use bytes::Bytes;
use contracts::{ContractError, Destination, DestinationRole, Event, SinkConfig};
use observability::FlushTrigger;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, instrument, warn};

use crate::accumulator::{Accumulator, BufferLimits};
use crate::backoff::BackoffPolicy;
use crate::dispatcher::{Dispatcher, SecondaryTarget, TaskContext};
use crate::error::SinkError;
use crate::health::{probe_until_healthy, HealthTracker};
use crate::metrics::MetricsSnapshot;
use crate::scheduler::run_flush_timer;

/// Builder for creating an EventSink
pub struct EventSinkBuilder<P, S = P> {
    config: SinkConfig,
    primary: P,
    secondary: Option<S>,
}

impl<P> EventSinkBuilder<P, P> {
    /// Create a new EventSinkBuilder
    pub fn new(config: SinkConfig, primary: P) -> Self {
        Self {
            config,
            primary,
            secondary: None,
        }
    }
}

impl<P, S> EventSinkBuilder<P, S>
where
    P: Destination + Sync + 'static,
    S: Destination + Sync + 'static,
{
    /// Attach the overflow destination described by `config.secondary`
    pub fn secondary<S2>(self, secondary: S2) -> EventSinkBuilder<P, S2> {
        EventSinkBuilder {
            config: self.config,
            primary: self.primary,
            secondary: Some(secondary),
        }
    }

    /// Build the sink and start its background tasks
    ///
    /// Must be called from within a tokio runtime; that runtime runs every
    /// background task for the lifetime of the sink.
    ///
    /// # Errors
    /// - [`SinkError::NoRuntime`] outside a runtime
    /// - [`SinkError::Contract`] when the secondary destination and the
    ///   `[secondary]` config section disagree, or `time_limit_ms` or
    ///   `max_retries` is zero
    #[instrument(
        name = "event_sink_build",
        skip(self),
        fields(primary = %self.primary.name())
    )]
    pub fn build(self) -> Result<EventSink<P, S>, SinkError> {
        let runtime = Handle::try_current()?;
        let config = self.config;

        if config.buffer.time_limit_ms == 0 {
            return Err(ContractError::config_validation(
                "buffer.time_limit_ms",
                "must be greater than 0",
            )
            .into());
        }
        if config.backoff.max_retries == 0 {
            return Err(ContractError::config_validation(
                "backoff.max_retries",
                "must be greater than 0",
            )
            .into());
        }

        let secondary = match (self.secondary, &config.secondary) {
            (Some(destination), Some(section)) => Some(SecondaryTarget {
                destination: Arc::new(destination),
                limits: section.request_limits(),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(ContractError::config_validation(
                    "secondary",
                    "secondary destination supplied without a [secondary] section",
                )
                .into())
            }
            (None, Some(section)) => {
                return Err(ContractError::config_validation(
                    "secondary",
                    format!(
                        "[secondary] '{}' configured but no destination supplied",
                        section.destination.name
                    ),
                )
                .into())
            }
        };

        let primary = Arc::new(self.primary);
        let health = Arc::new(HealthTracker::new(secondary.is_some()));
        let context = TaskContext {
            tasks: TaskTracker::new(),
            runtime,
            abandon: CancellationToken::new(),
        };
        let shutdown = CancellationToken::new();
        let check_interval = config.startup.check_interval();

        // Probes
        context.tasks.spawn_on(
            probe_until_healthy(
                Arc::clone(&primary),
                DestinationRole::Primary,
                Arc::clone(&health),
                check_interval,
                shutdown.clone(),
            ),
            &context.runtime,
        );
        if let Some(target) = &secondary {
            context.tasks.spawn_on(
                probe_until_healthy(
                    Arc::clone(&target.destination),
                    DestinationRole::Secondary,
                    Arc::clone(&health),
                    check_interval,
                    shutdown.clone(),
                ),
                &context.runtime,
            );
        }

        let dispatcher = Arc::new(Dispatcher::new(
            primary,
            secondary,
            Arc::clone(&health),
            BackoffPolicy::from_config(&config.backoff),
            context.clone(),
        ));
        let accumulator = Arc::new(Accumulator::new(BufferLimits::from(&config.buffer)));

        // Flush timer
        let timer_dispatcher = Arc::clone(&dispatcher);
        context.tasks.spawn_on(
            run_flush_timer(
                Arc::clone(&accumulator),
                config.buffer.time_limit(),
                shutdown.clone(),
                move |batch| timer_dispatcher.dispatch(batch, FlushTrigger::Timer),
            ),
            &context.runtime,
        );

        info!(
            byte_limit = config.buffer.byte_limit,
            record_limit = config.buffer.record_limit,
            time_limit_ms = config.buffer.time_limit_ms,
            has_secondary = health.has_secondary(),
            "Event sink started"
        );

        Ok(EventSink {
            accumulator,
            dispatcher,
            health,
            context,
            shutdown,
            grace_period: config.shutdown.grace_period(),
        })
    }
}

/// Buffered, failover-capable event sink
///
/// `store_raw_events` never blocks on a destination and never fails; delivery
/// problems are retried in the background.
pub struct EventSink<P, S = P> {
    accumulator: Arc<Accumulator>,
    dispatcher: Arc<Dispatcher<P, S>>,
    health: Arc<HealthTracker>,
    context: TaskContext,
    shutdown: CancellationToken,
    grace_period: std::time::Duration,
}

impl<P, S> EventSink<P, S>
where
    P: Destination + Sync + 'static,
    S: Destination + Sync + 'static,
{
    /// Buffer payloads under one partition key
    ///
    /// Any batch the size thresholds force out is dispatched immediately.
    pub fn store_raw_events<I>(&self, payloads: I, partition_key: &str)
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        let events: Vec<Event> = payloads
            .into_iter()
            .map(|payload| Event::new(payload, partition_key))
            .collect();
        if events.is_empty() {
            return;
        }

        observability::record_events_stored(events.len());
        for batch in self.accumulator.store_all(events) {
            self.dispatcher.dispatch(batch, FlushTrigger::Size);
        }
    }

    /// Dispatch whatever is pending now
    pub fn flush(&self) {
        match self.accumulator.flush() {
            Some(batch) => self.dispatcher.dispatch(batch, FlushTrigger::Manual),
            None => debug!("Flush requested with nothing pending"),
        }
    }

    /// True while at least one configured destination is healthy
    pub fn is_healthy(&self) -> bool {
        self.health.any_healthy()
    }

    pub fn destination_healthy(&self, role: DestinationRole) -> bool {
        self.health.is_healthy(role)
    }

    /// Events buffered and not yet dispatched
    pub fn pending_len(&self) -> usize {
        self.accumulator.pending_len()
    }

    /// Get metrics for both destinations
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.dispatcher.metrics()
    }

    /// Flush once more, stop background work and wait for outstanding writes
    ///
    /// Waits at most the configured grace period; retries still pending after
    /// that are abandoned.
    #[instrument(name = "event_sink_shutdown", skip(self))]
    pub async fn shutdown(self) -> ShutdownReport {
        info!("Shutting down event sink");

        if let Some(batch) = self.accumulator.flush() {
            self.dispatcher.dispatch(batch, FlushTrigger::Shutdown);
        }

        self.shutdown.cancel();
        self.context.tasks.close();

        let drained = match tokio::time::timeout(self.grace_period, self.context.tasks.wait()).await
        {
            Ok(()) => {
                info!("Event sink shutdown complete");
                true
            }
            Err(_) => {
                warn!(
                    grace_period_ms = self.grace_period.as_millis() as u64,
                    outstanding = self.context.tasks.len(),
                    "Grace period elapsed, abandoning pending retries"
                );
                self.context.abandon.cancel();
                false
            }
        };

        ShutdownReport {
            drained,
            metrics: self.dispatcher.metrics(),
        }
    }
}

/// What `shutdown` observed
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    /// Every outstanding write finished within the grace period
    pub drained: bool,
    /// Final per-destination counters, primary first
    pub metrics: Vec<(String, MetricsSnapshot)>,
}

impl<P, S> Drop for EventSink<P, S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
