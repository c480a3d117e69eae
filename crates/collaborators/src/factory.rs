//! Backend factory - builds delivery backends from configuration

use contracts::{
    BackendConfig, BackendKind, ContractError, DeliveryBackend, DeliveryReceipt, Email,
    MockBehavior,
};
use tracing::instrument;

use crate::{LogBackend, MockBackend};

/// A backend selected by configuration
pub enum ConfiguredBackend {
    Log(LogBackend),
    Mock(MockBackend),
}

impl DeliveryBackend for ConfiguredBackend {
    fn name(&self) -> &str {
        match self {
            Self::Log(backend) => backend.name(),
            Self::Mock(backend) => backend.name(),
        }
    }

    async fn send(&self, email: &Email) -> Result<DeliveryReceipt, ContractError> {
        match self {
            Self::Log(backend) => backend.send(email).await,
            Self::Mock(backend) => backend.send(email).await,
        }
    }
}

/// Create a backend from its configuration
#[instrument(
    name = "collaborators_build_backend",
    skip(config),
    fields(backend = %config.name, kind = ?config.kind)
)]
pub fn build_backend(config: &BackendConfig) -> ConfiguredBackend {
    match &config.kind {
        BackendKind::Log => ConfiguredBackend::Log(LogBackend::new(&config.name)),
        BackendKind::Mock {
            behavior: MockBehavior::FailEvery,
            fail_every,
        } => ConfiguredBackend::Mock(MockBackend::failing_every(
            &config.name,
            fail_every.unwrap_or(1),
        )),
        BackendKind::Mock { behavior, .. } => {
            ConfiguredBackend::Mock(MockBackend::with_behavior(&config.name, *behavior))
        }
    }
}
