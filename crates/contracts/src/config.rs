//! RelayConfig - Config Loader output
//!
//! Describes the source queues, health thresholds, cadence and backends.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Source queue identifiers, drained every iteration
    pub queue_urls: Vec<String>,

    /// All-success iterations (strictly more than this) before an unhealthy backend recovers
    #[serde(default = "default_healthy_threshold")]
    pub healthy_threshold: u32,

    /// Failing iterations (strictly more than this) before a healthy backend is demoted
    #[serde(default = "default_unhealthy_threshold")]
    pub unhealthy_threshold: u32,

    /// Floor on the duration of one read/dispatch iteration
    #[serde(default = "default_minimum_iteration_duration_ms")]
    pub minimum_iteration_duration_ms: u64,

    /// Timeout applied to every collaborator call
    #[serde(default = "default_client_timeout_secs")]
    pub client_timeout_secs: u64,

    /// Concurrent deliveries per backend sender
    #[serde(default = "default_max_in_flight_sends")]
    pub max_in_flight_sends: usize,

    /// Concurrent receive calls across all queues
    #[serde(default = "default_max_concurrent_receives")]
    pub max_concurrent_receives: usize,

    /// Count unparseable payloads against the backend that dropped them
    #[serde(default)]
    pub poison_counts_as_failure: bool,

    /// Backend with tie-break priority
    pub backend_a: BackendConfig,

    /// Second backend
    pub backend_b: BackendConfig,
}

impl RelayConfig {
    pub fn minimum_iteration_duration(&self) -> Duration {
        Duration::from_millis(self.minimum_iteration_duration_ms)
    }

    pub fn client_timeout(&self) -> Duration {
        Duration::from_secs(self.client_timeout_secs)
    }
}

fn default_healthy_threshold() -> u32 {
    3
}

fn default_unhealthy_threshold() -> u32 {
    2
}

fn default_minimum_iteration_duration_ms() -> u64 {
    1000
}

fn default_client_timeout_secs() -> u64 {
    10
}

fn default_max_in_flight_sends() -> usize {
    64
}

fn default_max_concurrent_receives() -> usize {
    256
}

/// Delivery backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Display name, e.g. "sendgrid"
    pub name: String,

    /// Implementation to use
    #[serde(flatten)]
    pub kind: BackendKind,
}

/// Backend implementation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    /// Accept and log every email
    Log,
    /// Scripted behaviour, for drills and tests
    Mock {
        #[serde(default)]
        behavior: MockBehavior,
        /// Used when `behavior = "fail_every"`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fail_every: Option<u32>,
    },
}

/// Scripted mock backend behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockBehavior {
    /// Accept everything
    #[default]
    Accept,
    /// Reachable, but refuses every email
    Reject,
    /// Unreachable
    Error,
    /// Refuse every n-th email
    FailEvery,
}
