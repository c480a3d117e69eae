//! # Dispatcher
//!
//! 投递分发模块。
//!
//! 负责：
//! - 按两个后端的健康状态切分每个批次（含对降级后端的 canary 流量）
//! - 两个后端并发投递，逐条执行删除或可见性重置
//! - 批次完成后更新各后端的健康状态机

pub mod dispatcher;
pub mod error;
pub mod health;
pub mod metrics;
pub mod sender;
pub mod split;

pub use contracts::{BackendId, DeliveryBackend, QueueClient, QueuedItem};
pub use dispatcher::{create_dispatcher, DispatchReport, Dispatcher, DispatcherConfig};
pub use error::DispatcherError;
pub use health::{BackendHealth, HealthThresholds, HealthTracker, HealthTransition};
pub use metrics::{MetricsSnapshot, SenderMetrics};
pub use sender::{BackendSender, DeliveryOutcome, SubBatchReport};
pub use split::{partition, split_plan, SplitPlan};
