//! 分优先级、按日分区的持久事件队列（eventq-domain）
//!
//! 生产者以“优先级 + 事件名 + 参数”入队；消费者按给定的优先级顺序逐条取出，保证：
//! - 高优先级先于低优先级被取空；
//! - 同一优先级内，较早自然日入队的事件先于较晚的事件投递，与入队先后无关。
//!
//! 组成（由底向上）：
//! - `partition`：优先级标签、分区标识与命名器；
//! - `broker`：Broker 协议、降级适配器与内存/Postgres 实现；
//! - `registry`：分区登记簿（处理进度）；
//! - `delivery`：投递引擎（入队/出队/状态）；
//! - `sweeper`：清理已排空的分区；
//! - `message`/`event`/`config`：消息编解码、类型化事件与配置。
//!
//! 典型用法：
//! ```rust
//! use eventq_domain::broker::InMemoryBroker;
//! use eventq_domain::delivery::DeliveryEngine;
//! use eventq_domain::registry::InMemoryPartitionRegistry;
//! use std::sync::Arc;
//!
//! # async fn demo() -> eventq_domain::error::QueueResult<()> {
//! let engine = DeliveryEngine::builder()
//!     .broker(Arc::new(InMemoryBroker::new()))
//!     .registry(Arc::new(InMemoryPartitionRegistry::new()))
//!     .build();
//!
//! engine.enqueue("high", "user_signed_up", &serde_json::json!({"id": 1})).await?;
//! let next = engine.dequeue(["high", "medium", "low"]).await?;
//! assert_eq!(next.unwrap().event(), "user_signed_up");
//! # Ok(())
//! # }
//! ```
//!
pub mod broker;
pub mod config;
pub mod delivery;
pub mod error;
pub mod event;
pub mod message;
pub mod partition;
pub mod registry;
pub mod sweeper;

// 允许在本 crate 内部通过 ::eventq_domain 进行自引用，
// 以便过程宏在本 crate 的单元测试中也能解析到 ::eventq_domain 路径。
extern crate self as eventq_domain;
