use crate::partition::PartitionId;
use serde::Serialize;

/// 单个分区的状态快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStatus {
    pub partition_id: PartitionId,
    pub depth: u64,
    pub consumers: u32,
    pub last_processed_sequence: i64,
    /// Broker 通道是否可达；不可达时 `depth`/`consumers` 为 0
    pub available: bool,
}

/// 某个优先级下全部分区的汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriorityStatus {
    /// 可达分区的深度之和
    pub depth: u64,
    /// 按日期升序
    pub partitions: Vec<PartitionStatus>,
}

impl PriorityStatus {
    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &PartitionStatus> {
        self.partitions.iter().filter(|p| !p.available)
    }
}
