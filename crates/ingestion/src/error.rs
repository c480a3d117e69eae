//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 队列属性获取失败
    #[error("failed to fetch depth of queue {queue}: {source}")]
    DepthFetch {
        /// 队列 ID
        queue: String,
        /// 底层错误
        #[source]
        source: ContractError,
    },

    /// 队列属性中缺少深度字段
    #[error("queue {queue} did not report its depth")]
    DepthMissing {
        /// 队列 ID
        queue: String,
    },

    /// 深度字段无法解析为整数
    #[error("queue {queue} reported unparseable depth {value:?}")]
    DepthParse {
        /// 队列 ID
        queue: String,
        /// 原始值
        value: String,
    },

    /// 接收消息失败
    #[error("failed to receive from queue {queue}: {source}")]
    Receive {
        /// 队列 ID
        queue: String,
        /// 底层错误
        #[source]
        source: ContractError,
    },

    /// 读取并发许可已关闭
    #[error("receive permits closed")]
    PermitsClosed,
}

impl IngestionError {
    /// 出错的队列 (若有)
    pub fn queue(&self) -> Option<&str> {
        match self {
            Self::DepthFetch { queue, .. }
            | Self::DepthMissing { queue }
            | Self::DepthParse { queue, .. }
            | Self::Receive { queue, .. } => Some(queue),
            Self::PermitsClosed => None,
        }
    }
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
