//! 投递引擎（delivery）
//!
//! 统一编排入队与出队：
//! - 入队：解析分区 → 编码 → 写入 Broker → 确保登记行存在；
//! - 出队：按调用方给定的优先级顺序、每个优先级内按日期从早到晚扫描分区，返回第一条消息；
//! - 管理：分区状态汇总、重连、关闭与清理。
//!
mod engine;
mod status;

pub use engine::{DeliveryConfig, DeliveryEngine};
pub use status::{PartitionStatus, PriorityStatus};
