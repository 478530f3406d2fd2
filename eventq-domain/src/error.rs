//! 队列层统一错误定义
//!
//! 只有“调用方输入错误”会以 `QueueError` 返回给生产者/消费者；
//! Broker 与 Registry 的连通性错误在 `BrokerAdapter`/`DeliveryEngine` 内部记录日志后吞掉，
//! 这里仍保留对应变体，供底层实现与清理器使用。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum QueueError {
    // --- 序列化 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid params: {reason}")]
    InvalidParams { reason: String },
    #[error("invalid event name: {name:?}")]
    InvalidEvent { name: String },

    // --- 标识 ---
    #[error("invalid priority: label={label:?}, reason={reason}")]
    InvalidPriority { label: String, reason: String },
    #[error("invalid partition id: {reason}")]
    InvalidPartition { reason: String },

    // --- 基础设施 ---
    #[error("broker error: channel={channel}, reason={reason}")]
    Broker { channel: String, reason: String },
    #[error("registry error: {reason}")]
    Registry { reason: String },
    #[error("database error: {reason}")]
    Database { reason: String },

    // --- 配置 ---
    #[error("config error: {reason}")]
    Config { reason: String },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl QueueError {
    pub fn broker(channel: impl Into<String>, reason: impl ToString) -> Self {
        Self::Broker {
            channel: channel.into(),
            reason: reason.to_string(),
        }
    }

    pub fn registry(reason: impl ToString) -> Self {
        Self::Registry {
            reason: reason.to_string(),
        }
    }

    pub fn config(reason: impl ToString) -> Self {
        Self::Config {
            reason: reason.to_string(),
        }
    }
}

/// 统一 Result 类型别名
pub type QueueResult<T> = Result<T, QueueError>;

// ---- Cross-crate conversions for infrastructure convenience ----

#[cfg(feature = "infra-sqlx")]
impl From<sqlx::Error> for QueueError {
    fn from(err: sqlx::Error) -> Self {
        QueueError::Database {
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for QueueError {
    fn from(err: toml::de::Error) -> Self {
        QueueError::Config {
            reason: err.to_string(),
        }
    }
}

impl From<chrono::ParseError> for QueueError {
    fn from(err: chrono::ParseError) -> Self {
        QueueError::InvalidPartition {
            reason: err.to_string(),
        }
    }
}
