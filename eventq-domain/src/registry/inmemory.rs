use super::{PartitionRegistry, RegistryRow};
use crate::{
    error::QueueResult as Result,
    partition::{PartitionId, Priority},
};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

/// 基于内存的登记簿实现
/// - 每个分区一行，更新在分片锁内完成，`record_progress` 对同一行是原子的
#[derive(Clone, Default)]
pub struct InMemoryPartitionRegistry {
    rows: Arc<DashMap<PartitionId, RegistryRow>>,
}

impl InMemoryPartitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl PartitionRegistry for InMemoryPartitionRegistry {
    async fn ensure(&self, partition: &PartitionId) -> Result<()> {
        self.rows.entry(partition.clone()).or_insert_with(|| {
            let now = Utc::now();
            RegistryRow::builder()
                .partition_id(partition.clone())
                .created_at(now)
                .updated_at(now)
                .build()
        });
        Ok(())
    }

    async fn record_progress(&self, partition: &PartitionId, sequence: i64) -> Result<()> {
        if let Some(mut row) = self.rows.get_mut(partition)
            && sequence > row.last_processed_sequence
        {
            row.last_processed_sequence = sequence;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list(&self, priority: &Priority) -> Result<Vec<PartitionId>> {
        let mut ids: Vec<PartitionId> = self
            .rows
            .iter()
            .filter(|e| e.key().priority() == priority)
            .map(|e| e.key().clone())
            .collect();
        ids.sort_by_key(|id| id.day());
        Ok(ids)
    }

    async fn get(&self, partition: &PartitionId) -> Result<Option<RegistryRow>> {
        Ok(self.rows.get(partition).map(|r| r.value().clone()))
    }

    async fn rows(&self) -> Result<Vec<RegistryRow>> {
        let mut rows: Vec<RegistryRow> = self.rows.iter().map(|e| e.value().clone()).collect();
        rows.sort_by(|a, b| a.partition_id.cmp(&b.partition_id));
        Ok(rows)
    }

    async fn drop_partition(&self, partition: &PartitionId) -> Result<bool> {
        Ok(self.rows.remove(partition).is_some())
    }
}
