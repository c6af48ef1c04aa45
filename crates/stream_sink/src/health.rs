//! Per-destination health flags and startup probing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{Destination, DestinationRole};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Health of the primary and, if configured, the secondary destination
///
/// Both start unhealthy until a probe or a write proves otherwise.
#[derive(Debug)]
pub struct HealthTracker {
    primary: AtomicBool,
    secondary: Option<AtomicBool>,
}

impl HealthTracker {
    pub fn new(has_secondary: bool) -> Self {
        Self {
            primary: AtomicBool::new(false),
            secondary: has_secondary.then(|| AtomicBool::new(false)),
        }
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    /// Health of one destination; an unconfigured secondary is never healthy
    pub fn is_healthy(&self, role: DestinationRole) -> bool {
        self.flag(role)
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// True when at least one configured destination is healthy
    pub fn any_healthy(&self) -> bool {
        self.is_healthy(DestinationRole::Primary) || self.is_healthy(DestinationRole::Secondary)
    }

    /// Update a flag, logging transitions
    pub fn set(&self, role: DestinationRole, healthy: bool) {
        let Some(flag) = self.flag(role) else {
            return;
        };
        let previous = flag.swap(healthy, Ordering::Relaxed);
        if previous != healthy {
            if healthy {
                info!(destination = %role, "Destination marked healthy");
            } else {
                warn!(destination = %role, "Destination marked unhealthy");
            }
            observability::record_destination_health(role, healthy);
        }
    }

    fn flag(&self, role: DestinationRole) -> Option<&AtomicBool> {
        match role {
            DestinationRole::Primary => Some(&self.primary),
            DestinationRole::Secondary => self.secondary.as_ref(),
        }
    }
}

/// Probe `destination` until it answers once, then mark it healthy
///
/// Sleeps `interval` between failed probes. Returns early when `cancel` fires.
/// After the first success the loop ends for good; from then on the dispatcher
/// owns the flag.
#[instrument(
    name = "startup_probe",
    skip(destination, health, cancel),
    fields(destination = %destination.name(), role = %role)
)]
pub async fn probe_until_healthy<D>(
    destination: Arc<D>,
    role: DestinationRole,
    health: Arc<HealthTracker>,
    interval: Duration,
    cancel: CancellationToken,
) where
    D: Destination + Sync,
{
    let mut attempts: u64 = 0;

    loop {
        attempts += 1;
        match destination.probe().await {
            Ok(()) => {
                info!(attempts, "Startup check passed");
                health.set(role, true);
                return;
            }
            Err(e) => {
                warn!(
                    attempts,
                    error = %e,
                    retry_in_ms = interval.as_millis() as u64,
                    "Startup check failed"
                );
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                debug!(attempts, "Startup probing cancelled");
                return;
            }
        }
    }
}
