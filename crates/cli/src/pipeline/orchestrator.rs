//! Relay loop - repeated read → dispatch cycles at a bounded cadence.

use std::time::Duration;

use contracts::{BackendId, DeliveryBackend, QueueClient};
use dispatcher::{BackendHealth, DispatchReport, Dispatcher, SplitPlan};
use ingestion::QueueReader;
use observability::{record_iteration_metrics, IterationSample};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use super::PipelineStats;

/// Loop configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Iterations shorter than this sleep for the remainder
    pub minimum_iteration_duration: Duration,

    /// Stop after this many iterations (None = forever)
    pub max_iterations: Option<u64>,
}

/// Outcome of one read → dispatch cycle
#[derive(Debug, Clone)]
pub struct IterationReport {
    pub batch_size: usize,
    pub plan: SplitPlan,
    pub failures_a: usize,
    pub failures_b: usize,
    /// Health after this iteration's update
    pub health_a: BackendHealth,
    pub health_b: BackendHealth,
    /// Work time, excluding the cadence sleep
    pub elapsed: Duration,
    pub dispatch: DispatchReport,
}

impl IterationReport {
    /// Metrics sample for this iteration
    pub fn sample(&self) -> IterationSample {
        let (a, b) = (&self.dispatch.a, &self.dispatch.b);
        IterationSample {
            batch_size: self.batch_size,
            elapsed: self.elapsed,
            delivered: a.delivered + b.delivered,
            failed: a.failed + b.failed,
            poison: a.poison + b.poison,
            backend_failures: [a, b]
                .into_iter()
                .filter(|report| report.attempted > 0)
                .map(|report| (report.backend, report.failures))
                .collect(),
        }
    }
}

/// The relay loop
///
/// Has no shutdown hook of its own; a bounded run ends after
/// `max_iterations`, an unbounded one only with the process.
pub struct PipelineLoop<A, B, Q> {
    reader: QueueReader<Q>,
    dispatcher: Dispatcher<A, B, Q>,
    config: PipelineConfig,
    stats: PipelineStats,
}

impl<A, B, Q> PipelineLoop<A, B, Q>
where
    A: DeliveryBackend + Sync + 'static,
    B: DeliveryBackend + Sync + 'static,
    Q: QueueClient + Sync + 'static,
{
    pub fn new(reader: QueueReader<Q>, dispatcher: Dispatcher<A, B, Q>, config: PipelineConfig) -> Self {
        Self {
            reader,
            dispatcher,
            config,
            stats: PipelineStats::default(),
        }
    }

    /// Statistics so far
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Run one read → dispatch cycle
    ///
    /// An empty batch skips dispatch and leaves both health states untouched.
    #[instrument(name = "pipeline_loop_iteration", skip(self), fields(iteration = self.stats.iterations + 1))]
    pub async fn run_iteration(&mut self) -> IterationReport {
        let start = Instant::now();

        let batch = self.reader.read_batch().await;
        let batch_size = batch.len();
        let dispatch = self.dispatcher.dispatch(batch).await;

        let report = IterationReport {
            batch_size,
            plan: dispatch.plan,
            failures_a: dispatch.a.failures,
            failures_b: dispatch.b.failures,
            health_a: self.dispatcher.health(BackendId::A),
            health_b: self.dispatcher.health(BackendId::B),
            elapsed: start.elapsed(),
            dispatch,
        };

        self.record(&report);
        debug!(
            batch_size,
            to_a = report.plan.to_a,
            to_b = report.plan.to_b,
            failures_a = report.failures_a,
            failures_b = report.failures_b,
            healthy_a = report.health_a.is_healthy,
            healthy_b = report.health_b.is_healthy,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Iteration complete"
        );
        report
    }

    /// Repeat iterations, never faster than the configured minimum duration
    #[instrument(name = "pipeline_loop_run", skip(self))]
    pub async fn run(&mut self) -> PipelineStats {
        let started = Instant::now();
        info!(
            queues = self.reader.queue_urls().len(),
            backend_a = %self.dispatcher.backend_name(BackendId::A),
            backend_b = %self.dispatcher.backend_name(BackendId::B),
            max_iterations = ?self.config.max_iterations,
            "Relay loop started"
        );

        loop {
            if let Some(max) = self.config.max_iterations {
                if self.stats.iterations >= max {
                    break;
                }
            }

            let report = self.run_iteration().await;

            let remaining = self
                .config
                .minimum_iteration_duration
                .saturating_sub(report.elapsed);
            if !remaining.is_zero() {
                tokio::time::sleep(remaining).await;
            }
        }

        self.stats.duration = started.elapsed();
        info!(
            iterations = self.stats.iterations,
            delivered = self.stats.delivered,
            "Relay loop finished"
        );
        self.stats.clone()
    }

    fn record(&mut self, report: &IterationReport) {
        let sample = report.sample();
        record_iteration_metrics(&sample);

        let stats = &mut self.stats;
        stats.iterations += 1;
        if report.batch_size == 0 {
            stats.empty_iterations += 1;
        }
        stats.items_received += report.batch_size as u64;
        stats.delivered += sample.delivered as u64;
        stats.failed += sample.failed as u64;
        stats.poison += sample.poison as u64;
        stats.queue_action_failures += (report.dispatch.a.queue_action_failures
            + report.dispatch.b.queue_action_failures) as u64;
        stats.health_transitions += report.dispatch.transitions.len() as u64;
        stats.relay_metrics.update(&sample);
    }
}
