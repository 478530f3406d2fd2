//! 内存版 Broker（InMemoryBroker）
//!
//! 每个通道是一个 `VecDeque`，位点来自全局递增计数器。
//! 典型用途：测试环境、示例与本地开发；进程退出即丢失数据。

use super::{Broker, ChannelStatus, Delivery};
use crate::error::QueueResult as Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

#[derive(Clone, Default)]
pub struct InMemoryBroker {
    channels: Arc<DashMap<String, VecDeque<Delivery>>>,
    next_sequence: Arc<AtomicI64>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存在的通道名（排序后返回）
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn push(&self, channel: &str, body: &[u8]) -> Result<i64> {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push_back(Delivery {
                sequence,
                body: body.to_vec(),
            });
        Ok(sequence)
    }

    async fn pop(&self, channel: &str) -> Result<Option<Delivery>> {
        Ok(self
            .channels
            .get_mut(channel)
            .and_then(|mut queue| queue.pop_front()))
    }

    async fn status(&self, channel: &str) -> Result<ChannelStatus> {
        let depth = self
            .channels
            .get(channel)
            .map(|queue| queue.len() as u64)
            .unwrap_or(0);
        Ok(ChannelStatus {
            depth,
            consumers: 0,
        })
    }

    async fn delete_channel(&self, channel: &str) -> Result<()> {
        // 判空与删除在同一把分片锁内完成
        self.channels.remove_if(channel, |_, queue| queue.is_empty());
        Ok(())
    }
}
