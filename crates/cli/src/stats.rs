//! Run statistics.

use std::time::Duration;

use stream_sink::MetricsSnapshot;

/// Statistics from one `run`
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Lines read from stdin and handed to the sink
    pub events_read: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Whether every outstanding write finished within the grace period
    pub drained: bool,

    /// Final per-destination counters
    pub destinations: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    /// Input throughput
    pub fn events_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.events_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Events acknowledged by any destination
    pub fn delivered(&self) -> u64 {
        self.destinations
            .iter()
            .map(|(_, m)| m.records_succeeded)
            .sum()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                      Sink Statistics                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Events read: {}", self.events_read);
        println!("   ├─ Events delivered: {}", self.delivered());
        println!("   ├─ Events/s: {:.2}", self.events_per_sec());
        println!("   └─ Drained: {}", if self.drained { "yes" } else { "no" });

        for (name, m) in &self.destinations {
            println!("\nDestination '{}'", name);
            println!("   ├─ Requests: {}", m.request_count);
            println!("   ├─ Failed requests: {}", m.request_failure_count);
            println!("   ├─ Records succeeded: {}", m.records_succeeded);
            println!("   ├─ Records failed: {}", m.records_failed);
            println!("   ├─ Retries: {}", m.retry_count);
            println!("   └─ Failovers: {}", m.failover_count);
        }

        println!();
    }
}
