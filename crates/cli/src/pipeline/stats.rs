//! Relay loop statistics.

use std::time::Duration;

use observability::RelayMetricsAggregator;

/// Statistics from a relay run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Iterations completed
    pub iterations: u64,

    /// Iterations that read nothing
    pub empty_iterations: u64,

    /// Items read from all queues
    pub items_received: u64,

    /// Items accepted by a backend
    pub delivered: u64,

    /// Items returned to their queue after a failed delivery
    pub failed: u64,

    /// Unparseable items dropped
    pub poison: u64,

    /// Delete or visibility-reset calls that did not complete
    pub queue_action_failures: u64,

    /// Backend health flips in either direction
    pub health_transitions: u64,

    /// Total duration of the run, cadence sleeps included
    pub duration: Duration,

    /// Per-iteration aggregates
    pub relay_metrics: RelayMetricsAggregator,
}

impl PipelineStats {
    /// Delivered items per second
    pub fn throughput(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.delivered as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n=== Relay Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Iterations: {} ({} empty)",
            self.iterations, self.empty_iterations
        );
        println!("   ├─ Items received: {}", self.items_received);
        println!("   ├─ Delivered: {}", self.delivered);
        println!("   ├─ Failed (requeued): {}", self.failed);
        println!("   ├─ Poison dropped: {}", self.poison);
        println!("   ├─ Queue action failures: {}", self.queue_action_failures);
        println!("   ├─ Health transitions: {}", self.health_transitions);
        println!("   └─ Throughput: {:.2} emails/s", self.throughput());

        let summary = self.relay_metrics.summary();
        println!("\nIterations");
        println!("   ├─ Batch size: {}", summary.batch_size);
        println!("   └─ Duration (ms): {}", summary.iteration_ms);

        if !summary.failing_iterations.is_empty() {
            println!("\nFailing iterations");
            for (backend, count) in &summary.failing_iterations {
                println!("   ├─ backend {}: {}", backend, count);
            }
        }

        println!();
    }
}
