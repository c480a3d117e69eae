//! `run` command implementation.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use collaborators::{build_backend, MemoryQueue, Timed};
use config_loader::ConfigLoader;
use contracts::RelayConfig;
use dispatcher::create_dispatcher;
use ingestion::{QueueReader, ReaderConfig};
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::{ensure_config_exists, CliError};
use crate::pipeline::{PipelineConfig, PipelineLoop};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    ensure_config_exists(&args.config)?;

    let mut config = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(ms) = args.min_iteration_ms {
        info!(ms, "Overriding minimum iteration duration from CLI");
        config.minimum_iteration_duration_ms = ms;
    }
    if let Some(secs) = args.client_timeout_secs {
        info!(secs, "Overriding client timeout from CLI");
        config.client_timeout_secs = secs;
    }
    ConfigLoader::validate(&config).context("Configuration invalid after CLI overrides")?;

    info!(
        queues = config.queue_urls.len(),
        backend_a = %config.backend_a.name,
        backend_b = %config.backend_b.name,
        healthy_threshold = config.healthy_threshold,
        unhealthy_threshold = config.unhealthy_threshold,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    // Collaborators, every call bounded by the client timeout
    let timeout = config.client_timeout();
    let queue = Arc::new(Timed::new(MemoryQueue::new(&config.queue_urls), timeout));
    let backend_a = Arc::new(Timed::new(build_backend(&config.backend_a), timeout));
    let backend_b = Arc::new(Timed::new(build_backend(&config.backend_b), timeout));

    if let Some(ref seed) = args.seed {
        let first = config
            .queue_urls
            .first()
            .context("No queue to seed")?;
        let seeded = seed_queue(queue.inner(), first, seed)?;
        info!(queue = %first, items = seeded, "Seeded queue");
    }

    let reader = QueueReader::new(Arc::clone(&queue), ReaderConfig::from(&config));
    let dispatcher = create_dispatcher(&config, backend_a, backend_b, queue);
    let mut pipeline = PipelineLoop::new(
        reader,
        dispatcher,
        PipelineConfig {
            minimum_iteration_duration: config.minimum_iteration_duration(),
            max_iterations: (args.max_iterations > 0).then_some(args.max_iterations),
        },
    );

    info!("Starting relay loop...");

    let completed = tokio::select! {
        stats = pipeline.run() => Some(stats),
        _ = shutdown_signal() => None,
    };

    match completed {
        Some(stats) => {
            info!(
                iterations = stats.iterations,
                delivered = stats.delivered,
                failed = stats.failed,
                duration_secs = stats.duration.as_secs_f64(),
                "Relay completed"
            );
            stats.print_summary();
        }
        None => {
            warn!(
                iterations = pipeline.stats().iterations,
                "Received shutdown signal, exiting"
            );
            pipeline.stats().print_summary();
        }
    }

    Ok(())
}

/// Enqueue every non-blank line of `path` as one payload
///
/// Lines are enqueued verbatim, so malformed payloads exercise the poison path.
fn seed_queue(queue: &MemoryQueue, name: &str, path: &Path) -> Result<usize> {
    let content = std::fs::read_to_string(path).map_err(CliError::from)?;

    let mut seeded = 0;
    for line in content.lines().map(str::trim).filter(|line| !line.is_empty()) {
        queue
            .enqueue(name, line)
            .map_err(|e| CliError::seed(path, e.to_string()))?;
        seeded += 1;
    }

    if seeded == 0 {
        warn!(path = %path.display(), "Seed file contained no payloads");
    }
    Ok(seeded)
}

/// Resolve on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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
fn print_config_summary(config: &RelayConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Queues ({}):", config.queue_urls.len());
    for queue in &config.queue_urls {
        println!("  - {}", queue);
    }
    println!("\nBackends:");
    println!("  A: {} ({:?})", config.backend_a.name, config.backend_a.kind);
    println!("  B: {} ({:?})", config.backend_b.name, config.backend_b.kind);
    println!("\nHealth:");
    println!("  Healthy threshold: {}", config.healthy_threshold);
    println!("  Unhealthy threshold: {}", config.unhealthy_threshold);
    println!("\nCadence:");
    println!(
        "  Minimum iteration: {}ms",
        config.minimum_iteration_duration_ms
    );
    println!("  Client timeout: {}s", config.client_timeout_secs);
    println!();
}
