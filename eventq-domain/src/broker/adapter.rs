//! Broker 适配器（BrokerAdapter）
//!
//! 包装任意 `Broker`，对外只暴露“不会失败”的操作：
//! 某个通道上的任何错误都会被记录，并把该通道标记为本次连接生命周期内不可用，
//! 之后对它的操作直接返回“无消息/未执行”，直到下一次 `reconnect`。
//! 这样一个分区的故障只会饿死该分区，而不会拖垮整个生产/消费流程。
//!
use super::{Broker, ChannelStatus, Delivery};
use crate::error::QueueResult as Result;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct BrokerAdapter {
    inner: Arc<Inner>,
}

struct Inner {
    broker: Arc<dyn Broker>,
    /// 通道名 -> 最近一次失败原因
    unusable: DashMap<String, String>,
}

impl fmt::Debug for BrokerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerAdapter")
            .field("unusable", &self.unusable_channels())
            .finish()
    }
}

impl BrokerAdapter {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self {
            inner: Arc::new(Inner {
                broker,
                unusable: DashMap::new(),
            }),
        }
    }

    pub fn is_usable(&self, channel: &str) -> bool {
        !self.inner.unusable.contains_key(channel)
    }

    /// 当前被标记为不可用的通道（排序后返回）
    pub fn unusable_channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .unusable
            .iter()
            .map(|e| e.key().clone())
            .collect();
        names.sort();
        names
    }

    /// 写入消息；成功返回位点，通道不可用或失败返回 `None`
    pub async fn push(&self, channel: &str, body: &[u8]) -> Option<i64> {
        if !self.is_usable(channel) {
            tracing::debug!(channel, "skip push on unusable channel");
            return None;
        }
        let result = self.inner.broker.push(channel, body).await;
        self.absorb(channel, "push", result)
    }

    pub async fn pop(&self, channel: &str) -> Option<Delivery> {
        if !self.is_usable(channel) {
            return None;
        }
        let result = self.inner.broker.pop(channel).await;
        self.absorb(channel, "pop", result).flatten()
    }

    /// 读取通道状态；通道不可用时返回 `None`（调用方应视为“未知”而非“为空”）
    pub async fn status(&self, channel: &str) -> Option<ChannelStatus> {
        if !self.is_usable(channel) {
            return None;
        }
        let result = self.inner.broker.status(channel).await;
        self.absorb(channel, "status", result)
    }

    /// 尽力删除通道，返回是否成功
    pub async fn delete_channel(&self, channel: &str) -> bool {
        if !self.is_usable(channel) {
            return false;
        }
        let result = self.inner.broker.delete_channel(channel).await;
        self.absorb(channel, "delete_channel", result).is_some()
    }

    /// 重置所有不可用标记并重新连接
    ///
    /// 无论连接是否成功都会清空标记：失败的通道会在下一次操作时重新被标记。
    pub async fn reconnect(&self) -> Result<()> {
        let cleared = self.inner.unusable.len();
        self.inner.unusable.clear();

        match self.inner.broker.connect().await {
            Ok(()) => {
                tracing::info!(cleared, "broker reconnected");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "broker reconnect failed");
                Err(err)
            }
        }
    }

    pub async fn close(&self) {
        self.inner.unusable.clear();
        self.inner.broker.close().await;
    }

    fn absorb<T>(&self, channel: &str, op: &'static str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(channel, op, error = %err, "broker operation failed, channel marked unusable");
                self.inner
                    .unusable
                    .insert(channel.to_string(), err.to_string());
                None
            }
        }
    }
}
