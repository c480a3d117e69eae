//! Relay loop orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{PipelineConfig, PipelineLoop};
pub use stats::PipelineStats;
