//! 分区（partition）
//!
//! 一个分区对应“一个优先级 + 一个自然日”的只追加通道：
//! - `Priority`：调用方定义的优先级标签；
//! - `PartitionId`：`(priority, day)` 的确定性标识；
//! - `PartitionNamer`：把入队时间映射到分区，并给出带命名空间的通道名。
//!
mod namer;
mod priority;

pub use namer::{PartitionId, PartitionNamer};
pub use priority::Priority;
