//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{BackendConfig, RelayConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::ensure_config_exists;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    queues: Vec<String>,
    backends: Vec<BackendInfo>,
    health: HealthInfo,
    cadence: CadenceInfo,
    limits: LimitInfo,
}

#[derive(Serialize)]
struct BackendInfo {
    slot: &'static str,
    name: String,
    kind: String,
}

#[derive(Serialize)]
struct HealthInfo {
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    poison_counts_as_failure: bool,
}

#[derive(Serialize)]
struct CadenceInfo {
    minimum_iteration_duration_ms: u64,
    client_timeout_secs: u64,
}

#[derive(Serialize)]
struct LimitInfo {
    max_in_flight_sends: usize,
    max_concurrent_receives: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    ensure_config_exists(&args.config)?;

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &RelayConfig) -> ConfigInfo {
    ConfigInfo {
        queues: config.queue_urls.clone(),
        backends: vec![
            backend_info("a", &config.backend_a),
            backend_info("b", &config.backend_b),
        ],
        health: HealthInfo {
            healthy_threshold: config.healthy_threshold,
            unhealthy_threshold: config.unhealthy_threshold,
            poison_counts_as_failure: config.poison_counts_as_failure,
        },
        cadence: CadenceInfo {
            minimum_iteration_duration_ms: config.minimum_iteration_duration_ms,
            client_timeout_secs: config.client_timeout_secs,
        },
        limits: LimitInfo {
            max_in_flight_sends: config.max_in_flight_sends,
            max_concurrent_receives: config.max_concurrent_receives,
        },
    }
}

fn backend_info(slot: &'static str, backend: &BackendConfig) -> BackendInfo {
    BackendInfo {
        slot,
        name: backend.name.clone(),
        kind: format!("{:?}", backend.kind),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== Relay Configuration ===\n");

    println!("Queues ({}):", info.queues.len());
    for queue in &info.queues {
        println!("  - {}", queue);
    }

    println!("\nBackends:");
    for backend in &info.backends {
        println!("  {} - {} [{}]", backend.slot, backend.name, backend.kind);
    }

    println!("\nHealth:");
    println!(
        "  Unhealthy after > {} failing iterations",
        info.health.unhealthy_threshold
    );
    println!(
        "  Healthy after > {} clean iterations",
        info.health.healthy_threshold
    );
    println!(
        "  Poison counts as failure: {}",
        info.health.poison_counts_as_failure
    );

    println!("\nCadence:");
    println!(
        "  Minimum iteration: {}ms",
        info.cadence.minimum_iteration_duration_ms
    );
    println!("  Client timeout: {}s", info.cadence.client_timeout_secs);

    println!("\nLimits:");
    println!("  In-flight sends per backend: {}", info.limits.max_in_flight_sends);
    println!("  Concurrent receives: {}", info.limits.max_concurrent_receives);
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_info() {
        let config = config_loader::ConfigLoader::load_from_str(
            r#"
queue_urls = ["q"]

[backend_a]
name = "sendgrid"
kind = "log"

[backend_b]
name = "ses"
kind = "mock"
"#,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        let info = build_config_info(&config);
        assert_eq!(info.queues, vec!["q"]);
        assert_eq!(info.backends[1].slot, "b");
        assert_eq!(info.backends[1].name, "ses");
        assert_eq!(info.health.unhealthy_threshold, 2);
        assert_eq!(info.cadence.minimum_iteration_duration_ms, 1000);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["limits"]["max_in_flight_sends"], 64);
    }
}
