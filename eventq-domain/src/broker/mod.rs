//! Broker 协议与适配器
//!
//! - `Broker`：对外部消息中间件的原始操作（push/pop/status/delete），失败即返回错误；
//! - `BrokerAdapter`：引擎持有的生命周期对象，负责“记录日志 + 标记通道不可用 + 返回空”的降级策略；
//! - `InMemoryBroker`：进程内实现，用于测试与示例；
//! - `PgBroker`（`infra-sqlx` 特性）：基于 Postgres 表的持久化通道。
//!
mod adapter;
mod inmemory;
#[cfg(feature = "infra-sqlx")]
mod postgres;

pub use adapter::BrokerAdapter;
pub use inmemory::InMemoryBroker;
#[cfg(feature = "infra-sqlx")]
pub use postgres::PgBroker;

use crate::error::QueueResult as Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 一次成功的 pop：Broker 分配的位点与原始消息体
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sequence: i64,
    pub body: Vec<u8>,
}

/// 通道状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelStatus {
    /// 尚未被消费的消息数
    pub depth: u64,
    /// 当前挂在通道上的消费者数（不支持的实现返回 0）
    pub consumers: u32,
}

/// FIFO、至少一次的具名通道
///
/// 通道在首次 push 时惰性创建；对不存在的通道 pop 返回 `None`，status 返回深度 0。
#[async_trait]
pub trait Broker: Send + Sync {
    /// 建立/校验连接；`BrokerAdapter::reconnect` 时调用
    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    /// 写入一条消息，返回 Broker 分配的位点
    async fn push(&self, channel: &str, body: &[u8]) -> Result<i64>;

    /// 非阻塞地取出队首消息
    async fn pop(&self, channel: &str) -> Result<Option<Delivery>>;

    async fn status(&self, channel: &str) -> Result<ChannelStatus>;

    /// 删除空通道；通道内仍有消息时必须保留，不存在时视为成功
    async fn delete_channel(&self, channel: &str) -> Result<()>;

    /// 释放连接资源
    async fn close(&self) {}
}

#[async_trait]
impl<T> Broker for Arc<T>
where
    T: Broker + ?Sized,
{
    async fn connect(&self) -> Result<()> {
        (**self).connect().await
    }

    async fn push(&self, channel: &str, body: &[u8]) -> Result<i64> {
        (**self).push(channel, body).await
    }

    async fn pop(&self, channel: &str) -> Result<Option<Delivery>> {
        (**self).pop(channel).await
    }

    async fn status(&self, channel: &str) -> Result<ChannelStatus> {
        (**self).status(channel).await
    }

    async fn delete_channel(&self, channel: &str) -> Result<()> {
        (**self).delete_channel(channel).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
