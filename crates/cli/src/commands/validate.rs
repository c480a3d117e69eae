//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BackendKind, MockBehavior, RelayConfig};
use serde::Serialize;
use tracing::info;

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
    queue_count: usize,
    backend_a: String,
    backend_b: String,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    minimum_iteration_duration_ms: u64,
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

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    queue_count: config.queue_urls.len(),
                    backend_a: config.backend_a.name.clone(),
                    backend_b: config.backend_b.name.clone(),
                    healthy_threshold: config.healthy_threshold,
                    unhealthy_threshold: config.unhealthy_threshold,
                    minimum_iteration_duration_ms: config.minimum_iteration_duration_ms,
                }),
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

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.healthy_threshold == 0 && config.unhealthy_threshold == 0 {
        warnings.push(
            "Both health thresholds are 0 - backends flip state on every single iteration"
                .to_string(),
        );
    }

    if config.minimum_iteration_duration_ms == 0 {
        warnings.push(
            "minimum_iteration_duration_ms is 0 - backend call rate is not throttled".to_string(),
        );
    }

    for (slot, backend) in [("a", &config.backend_a), ("b", &config.backend_b)] {
        if let BackendKind::Mock {
            behavior: MockBehavior::Reject | MockBehavior::Error,
            ..
        } = backend.kind
        {
            warnings.push(format!(
                "backend_{} '{}' is a mock that never delivers",
                slot, backend.name
            ));
        }
    }

    if config.poison_counts_as_failure {
        warnings.push(
            "poison_counts_as_failure is enabled - malformed payloads degrade backend health"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Queues: {}", summary.queue_count);
            println!("  Backend A: {}", summary.backend_a);
            println!("  Backend B: {}", summary.backend_b);
            println!(
                "  Thresholds: healthy > {}, unhealthy > {}",
                summary.healthy_threshold, summary.unhealthy_threshold
            );
            println!(
                "  Minimum iteration: {}ms",
                summary.minimum_iteration_duration_ms
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
queue_urls = ["high", "low"]
healthy_threshold = 0
unhealthy_threshold = 0
minimum_iteration_duration_ms = 0

[backend_a]
name = "sendgrid"
kind = "log"

[backend_b]
name = "ses"
kind = "mock"
behavior = "error"
"#;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_with_warnings() {
        let file = write_config(CONFIG);
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });

        assert!(result.valid);
        let warnings = result.warnings.unwrap();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("backend_b 'ses'")));
        assert_eq!(result.summary.unwrap().queue_count, 2);
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nonexistent/relay.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_invalid_config() {
        let file = write_config(&CONFIG.replace(r#"["high", "low"]"#, "[]"));
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.is_some());
    }
}
