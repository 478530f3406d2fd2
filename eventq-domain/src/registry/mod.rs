//! 分区登记簿（PartitionRegistry）
//!
//! 记录每个曾经写入过消息的分区，以及该分区已知处理完成的最大位点。
//! 出队时按“日期从早到晚”列出某优先级的分区，这是“早一天的消息先投递”的实现机制。
//!
mod inmemory;
#[cfg(feature = "infra-sqlx")]
mod postgres;

pub use inmemory::InMemoryPartitionRegistry;
#[cfg(feature = "infra-sqlx")]
pub use postgres::PgPartitionRegistry;

use crate::{
    error::QueueResult as Result,
    partition::{PartitionId, Priority},
};
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 登记簿中的一行
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
pub struct RegistryRow {
    partition_id: PartitionId,
    /// 已知处理完成的最大位点，只增不减
    #[builder(default)]
    last_processed_sequence: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RegistryRow {
    pub fn partition_id(&self) -> &PartitionId {
        &self.partition_id
    }

    pub fn last_processed_sequence(&self) -> i64 {
        self.last_processed_sequence
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[async_trait]
pub trait PartitionRegistry: Send + Sync {
    /// 幂等插入：不存在时创建进度为 0 的行
    async fn ensure(&self, partition: &PartitionId) -> Result<()>;

    /// 原子地把进度提升到 `max(current, sequence)`；行不存在时为空操作
    async fn record_progress(&self, partition: &PartitionId, sequence: i64) -> Result<()>;

    /// 某优先级的全部分区，按日期升序（最早的在前）
    async fn list(&self, priority: &Priority) -> Result<Vec<PartitionId>>;

    async fn get(&self, partition: &PartitionId) -> Result<Option<RegistryRow>>;

    /// 全部登记行（供清理器遍历）
    async fn rows(&self) -> Result<Vec<RegistryRow>>;

    /// 删除登记行，返回是否确实删除了一行；只应由清理器在确认通道为空后调用
    async fn drop_partition(&self, partition: &PartitionId) -> Result<bool>;
}

#[async_trait]
impl<T> PartitionRegistry for Arc<T>
where
    T: PartitionRegistry + ?Sized,
{
    async fn ensure(&self, partition: &PartitionId) -> Result<()> {
        (**self).ensure(partition).await
    }

    async fn record_progress(&self, partition: &PartitionId, sequence: i64) -> Result<()> {
        (**self).record_progress(partition, sequence).await
    }

    async fn list(&self, priority: &Priority) -> Result<Vec<PartitionId>> {
        (**self).list(priority).await
    }

    async fn get(&self, partition: &PartitionId) -> Result<Option<RegistryRow>> {
        (**self).get(partition).await
    }

    async fn rows(&self) -> Result<Vec<RegistryRow>> {
        (**self).rows().await
    }

    async fn drop_partition(&self, partition: &PartitionId) -> Result<bool> {
        (**self).drop_partition(partition).await
    }
}
