//! Dispatcher - routes flushed batches and drives retry / failover
//!
//! Every write runs as a task on the captured runtime. A failed subset is
//! re-submitted as a new task after its backoff delay.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use contracts::{
    Batch, Destination, DestinationRole, Event, RecordFailure, RecordOutcome, RequestLimits,
    WriteOutcome,
};
use observability::FlushTrigger;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, instrument, warn};

use crate::backoff::{BackoffPolicy, BackoffState};
use crate::health::HealthTracker;
use crate::metrics::{DestinationMetrics, MetricsSnapshot};
use crate::splitter;

/// Failure code for events a destination returned no result for
pub const MISSING_RESULT: &str = "MissingResult";

/// Failure code for events inside a request that failed as a whole
pub const REQUEST_FAILED: &str = "RequestFailed";

/// Overflow destination together with its per-request ceilings
pub struct SecondaryTarget<S> {
    pub destination: Arc<S>,
    pub limits: RequestLimits,
}

/// Background task plumbing shared by every retry sequence
#[derive(Clone)]
pub struct TaskContext {
    pub tasks: TaskTracker,
    pub runtime: Handle,
    /// Fires once the shutdown grace period has lapsed
    pub abandon: CancellationToken,
}

/// One retry sequence: a batch, where it goes next, and how long it has waited
#[derive(Debug)]
struct Attempt {
    batch: Batch,
    role: DestinationRole,
    backoff: BackoffState,
}

/// Rejected events sharing one error code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureSummary {
    pub code: String,
    pub count: usize,
    pub example_message: String,
}

/// Group failures by code, keeping the first message seen for each
///
/// Codes come back sorted so log output is stable.
pub fn summarize_failures<'a>(
    failures: impl IntoIterator<Item = &'a RecordFailure>,
) -> Vec<FailureSummary> {
    let mut by_code: BTreeMap<&str, (usize, &str)> = BTreeMap::new();
    for failure in failures {
        by_code
            .entry(failure.code.as_str())
            .or_insert((0, failure.message.as_str()))
            .0 += 1;
    }

    by_code
        .into_iter()
        .map(|(code, (count, example))| FailureSummary {
            code: code.to_string(),
            count,
            example_message: example.to_string(),
        })
        .collect()
}

/// Pad or truncate a destination's per-event results to `expected` entries
///
/// A missing result counts as a failure so the event is retried.
fn align_outcomes(mut outcomes: Vec<RecordOutcome>, expected: usize) -> Vec<RecordOutcome> {
    if outcomes.len() != expected {
        warn!(
            expected,
            received = outcomes.len(),
            "Destination returned a mismatched number of results"
        );
    }
    outcomes.truncate(expected);
    outcomes.resize_with(expected, || {
        Err(RecordFailure::new(
            MISSING_RESULT,
            "destination returned no result for this event",
        ))
    });
    outcomes
}

/// Routes batches to the primary or secondary destination and retries failures
pub struct Dispatcher<P, S = P> {
    primary: Arc<P>,
    secondary: Option<SecondaryTarget<S>>,
    health: Arc<HealthTracker>,
    policy: BackoffPolicy,
    context: TaskContext,
    primary_metrics: DestinationMetrics,
    secondary_metrics: DestinationMetrics,
}

impl<P, S> Dispatcher<P, S>
where
    P: Destination + Sync + 'static,
    S: Destination + Sync + 'static,
{
    pub fn new(
        primary: Arc<P>,
        secondary: Option<SecondaryTarget<S>>,
        health: Arc<HealthTracker>,
        policy: BackoffPolicy,
        context: TaskContext,
    ) -> Self {
        Self {
            primary,
            secondary,
            health,
            policy,
            context,
            primary_metrics: DestinationMetrics::new(),
            secondary_metrics: DestinationMetrics::new(),
        }
    }

    /// Hand a flushed batch to a new retry sequence
    ///
    /// Returns immediately; the write runs in the background.
    pub fn dispatch(self: &Arc<Self>, batch: Batch, trigger: FlushTrigger) {
        if batch.is_empty() {
            return;
        }

        let bytes: usize = batch.iter().map(Event::size).sum();
        observability::record_batch_flushed(trigger, batch.len(), bytes);

        let role = self.route();
        debug!(
            trigger = trigger.as_str(),
            destination = %role,
            events = batch.len(),
            bytes,
            "Dispatching batch"
        );

        self.schedule(
            Attempt {
                batch,
                role,
                backoff: self.policy.fresh_state(),
            },
            Duration::ZERO,
        );
    }

    /// Destination for a fresh batch
    pub fn route(&self) -> DestinationRole {
        if self.health.is_healthy(DestinationRole::Primary) || self.secondary.is_none() {
            DestinationRole::Primary
        } else {
            DestinationRole::Secondary
        }
    }

    /// Per-destination counters, primary first
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        let mut out = vec![(
            self.primary.name().to_string(),
            self.primary_metrics.snapshot(),
        )];
        if let Some(target) = &self.secondary {
            out.push((
                target.destination.name().to_string(),
                self.secondary_metrics.snapshot(),
            ));
        }
        out
    }

    pub fn metrics_for(&self, role: DestinationRole) -> &DestinationMetrics {
        match role {
            DestinationRole::Primary => &self.primary_metrics,
            DestinationRole::Secondary => &self.secondary_metrics,
        }
    }

    fn is_configured(&self, role: DestinationRole) -> bool {
        match role {
            DestinationRole::Primary => true,
            DestinationRole::Secondary => self.secondary.is_some(),
        }
    }

    /// Run `attempt` on the captured runtime after `delay`
    ///
    /// Once the abandon token fires the batch is dropped instead, whether the
    /// delay is still pending or zero.
    fn schedule(self: &Arc<Self>, attempt: Attempt, delay: Duration) {
        let this = Arc::clone(self);
        self.context.tasks.spawn_on(
            async move {
                let abandoned = if delay.is_zero() {
                    this.context.abandon.is_cancelled()
                } else {
                    tokio::select! {
                        biased;
                        _ = this.context.abandon.cancelled() => true,
                        _ = tokio::time::sleep(delay) => false,
                    }
                };
                if abandoned {
                    warn!(
                        destination = %attempt.role,
                        events = attempt.batch.len(),
                        "Pending retry abandoned"
                    );
                    observability::record_events_abandoned(attempt.batch.len());
                    return;
                }
                this.attempt(attempt).await;
            },
            &self.context.runtime,
        );
    }

    #[instrument(
        name = "dispatcher_attempt",
        skip(self, attempt),
        fields(
            destination = %attempt.role,
            events = attempt.batch.len(),
            retries_remaining = attempt.backoff.retries_remaining
        )
    )]
    async fn attempt(self: Arc<Self>, attempt: Attempt) {
        let Attempt {
            batch,
            role,
            backoff,
        } = attempt;

        let outcome = self.write_to(role, &batch).await;
        if let Some(failed) = self.evaluate(role, batch, outcome) {
            self.retry_or_failover(failed, role, backoff);
        }
    }

    async fn write_to(&self, role: DestinationRole, events: &[Event]) -> WriteOutcome {
        // Secondary is only ever routed to when configured
        if let (DestinationRole::Secondary, Some(target)) = (role, &self.secondary) {
            return self.write_split(target, events).await;
        }

        self.primary_metrics.inc_request_count();
        let outcome = self.primary.write(events).await;
        if !outcome.is_reachable() {
            self.primary_metrics.inc_request_failure_count();
            observability::record_request_failure(DestinationRole::Primary);
        }
        outcome
    }

    /// Write `events` to the secondary in requests that respect its limits
    ///
    /// Groups go out one after another. Only when every group fails as a
    /// whole is the result a request-level failure; otherwise events of a
    /// failed group carry a [`REQUEST_FAILED`] result.
    async fn write_split(&self, target: &SecondaryTarget<S>, events: &[Event]) -> WriteOutcome {
        let lengths: Vec<usize> = splitter::split(
            events,
            |e: &&Event| e.size(),
            target.limits.max_records,
            target.limits.max_bytes,
        )
        .iter()
        .map(Vec::len)
        .collect();

        let request_count = lengths.len();
        let mut outcomes = Vec::with_capacity(events.len());
        let mut failed_requests = 0usize;
        let mut last_error = String::new();
        let mut offset = 0usize;

        for (index, len) in lengths.into_iter().enumerate() {
            let group = &events[offset..offset + len];
            offset += len;

            debug!(group = index, events = len, "Writing secondary request");
            self.secondary_metrics.inc_request_count();

            match target.destination.write(group).await {
                WriteOutcome::Partial(results) => outcomes.extend(align_outcomes(results, len)),
                WriteOutcome::TotalFailure { message } => {
                    failed_requests += 1;
                    self.secondary_metrics.inc_request_failure_count();
                    observability::record_request_failure(DestinationRole::Secondary);
                    outcomes.extend(
                        (0..len).map(|_| Err(RecordFailure::new(REQUEST_FAILED, message.clone()))),
                    );
                    last_error = message;
                }
            }
        }

        if failed_requests > 0 && failed_requests == request_count {
            return WriteOutcome::total_failure(last_error);
        }
        WriteOutcome::Partial(outcomes)
    }

    /// Account for a write and return the events that must be retried
    fn evaluate(&self, role: DestinationRole, batch: Batch, outcome: WriteOutcome) -> Option<Batch> {
        let metrics = self.metrics_for(role);
        let total = batch.len();

        let results = match outcome {
            WriteOutcome::TotalFailure { message } => {
                error!(destination = %role, events = total, error = %message, "Write request failed");
                metrics.add_records_failed(total);
                observability::record_records_written(role, 0, total);
                return Some(batch);
            }
            WriteOutcome::Partial(results) => results,
        };

        self.health.set(role, true);

        let mut failed = Vec::new();
        let mut failures = Vec::new();
        for (event, result) in batch.into_iter().zip(align_outcomes(results, total)) {
            if let Err(failure) = result {
                failed.push(event);
                failures.push(failure);
            }
        }

        let succeeded = total - failed.len();
        metrics.add_records_succeeded(succeeded);
        metrics.add_records_failed(failed.len());
        observability::record_records_written(role, succeeded, failed.len());

        if failed.is_empty() {
            debug!(destination = %role, events = total, "Batch delivered");
            return None;
        }

        for summary in summarize_failures(&failures) {
            warn!(
                destination = %role,
                code = %summary.code,
                count = summary.count,
                example = %summary.example_message,
                "Records rejected"
            );
        }
        Some(failed)
    }

    fn retry_or_failover(self: &Arc<Self>, failed: Batch, role: DestinationRole, backoff: BackoffState) {
        let events = failed.len();

        if !backoff.is_exhausted() {
            let delay = backoff.current_delay;
            warn!(
                destination = %role,
                events,
                delay_ms = delay.as_millis() as u64,
                retries_remaining = backoff.retries_remaining,
                "Scheduling retry"
            );
            self.metrics_for(role).inc_retry_count();
            observability::record_retry_scheduled(role, delay.as_secs_f64() * 1_000.0);
            self.schedule(
                Attempt {
                    batch: failed,
                    role,
                    backoff: backoff.advance(&self.policy),
                },
                delay,
            );
            return;
        }

        self.health.set(role, false);

        let other = role.other();
        if self.is_configured(other) {
            // An unhealthy target waits min backoff
            let delay = if self.health.is_healthy(other) {
                Duration::ZERO
            } else {
                self.policy.min()
            };
            warn!(
                from = %role,
                to = %other,
                events,
                delay_ms = delay.as_millis() as u64,
                "Retries exhausted, failing over"
            );
            self.metrics_for(role).inc_failover_count();
            observability::record_failover(role, other);
            self.schedule(
                Attempt {
                    batch: failed,
                    role: other,
                    backoff: self.policy.fresh_state(),
                },
                delay,
            );
        } else {
            let delay = self.policy.max();
            warn!(
                destination = %role,
                events,
                delay_ms = delay.as_millis() as u64,
                "Retries exhausted and no failover target, retrying at max backoff"
            );
            self.metrics_for(role).inc_retry_count();
            observability::record_retry_scheduled(role, delay.as_secs_f64() * 1_000.0);
            self.schedule(
                Attempt {
                    batch: failed,
                    role,
                    backoff: self.policy.pinned_state(),
                },
                delay,
            );
        }
    }
}
