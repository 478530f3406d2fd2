//! 事件队列消费端（eventq-worker）
//!
//! - `handler`：事件处理器及其订阅声明；
//! - `dispatcher`：按事件名把消息分发给处理器；
//! - `worker`：轮询出队、定时清理与重连的长驻任务；
//! - `observability`：日志初始化。
//!
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod observability;
pub mod worker;
