//! Backend health state machine.
//!
//! # States
//! - Healthy: backend receives its fair share of each batch
//! - Unhealthy: backend only receives canary traffic
//!
//! # State Transitions
//! ```text
//! Healthy → Unhealthy: consecutive failing iterations > unhealthy threshold
//! Unhealthy → Healthy: consecutive all-success iterations > healthy threshold
//! ```
//!
//! An iteration is failing when at least one item of the backend's sub-batch
//! failed. Both streak counters restart on a state change, so every flip
//! needs a full fresh streak.

use contracts::RelayConfig;
use tracing::{info, warn};

/// Streak thresholds (a streak must strictly exceed the threshold)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthThresholds {
    pub healthy: u32,
    pub unhealthy: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            healthy: 3,
            unhealthy: 2,
        }
    }
}

impl From<&RelayConfig> for HealthThresholds {
    fn from(config: &RelayConfig) -> Self {
        Self {
            healthy: config.healthy_threshold,
            unhealthy: config.unhealthy_threshold,
        }
    }
}

/// Health snapshot of one backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendHealth {
    pub is_healthy: bool,
    pub consecutive_healthy_checks: u32,
    pub consecutive_unhealthy_checks: u32,
}

impl Default for BackendHealth {
    fn default() -> Self {
        Self {
            is_healthy: true,
            consecutive_healthy_checks: 0,
            consecutive_unhealthy_checks: 0,
        }
    }
}

/// A state change produced by [`HealthTracker::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    BecameUnhealthy,
    BecameHealthy,
}

impl HealthTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BecameUnhealthy => "unhealthy",
            Self::BecameHealthy => "healthy",
        }
    }
}

/// Hysteresis tracker for one backend
///
/// Owned and mutated only by the dispatcher, once per iteration in which the
/// backend received items.
#[derive(Debug, Clone)]
pub struct HealthTracker {
    backend: String,
    thresholds: HealthThresholds,
    health: BackendHealth,
}

impl HealthTracker {
    /// New tracker, starting healthy
    pub fn new(backend: impl Into<String>, thresholds: HealthThresholds) -> Self {
        Self {
            backend: backend.into(),
            thresholds,
            health: BackendHealth::default(),
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn health(&self) -> BackendHealth {
        self.health
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy
    }

    /// Feed the failure count of one completed sub-batch
    pub fn record(&mut self, failures: usize) -> Option<HealthTransition> {
        let health = &mut self.health;

        match (failures > 0, health.is_healthy) {
            (true, true) => health.consecutive_unhealthy_checks += 1,
            (true, false) => health.consecutive_healthy_checks = 0,
            (false, true) => health.consecutive_unhealthy_checks = 0,
            (false, false) => health.consecutive_healthy_checks += 1,
        }

        let transition = if health.is_healthy
            && health.consecutive_unhealthy_checks > self.thresholds.unhealthy
        {
            Some(HealthTransition::BecameUnhealthy)
        } else if !health.is_healthy
            && health.consecutive_healthy_checks > self.thresholds.healthy
        {
            Some(HealthTransition::BecameHealthy)
        } else {
            None
        };

        if let Some(transition) = transition {
            self.apply(transition);
        }
        transition
    }

    fn apply(&mut self, transition: HealthTransition) {
        let streak = match transition {
            HealthTransition::BecameUnhealthy => self.health.consecutive_unhealthy_checks,
            HealthTransition::BecameHealthy => self.health.consecutive_healthy_checks,
        };

        self.health = BackendHealth {
            is_healthy: transition == HealthTransition::BecameHealthy,
            consecutive_healthy_checks: 0,
            consecutive_unhealthy_checks: 0,
        };

        match transition {
            HealthTransition::BecameUnhealthy => warn!(
                backend = %self.backend,
                streak,
                threshold = self.thresholds.unhealthy,
                "Backend marked unhealthy"
            ),
            HealthTransition::BecameHealthy => info!(
                backend = %self.backend,
                streak,
                threshold = self.thresholds.healthy,
                "Backend recovered"
            ),
        }
    }
}
