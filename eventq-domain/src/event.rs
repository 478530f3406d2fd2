//! 类型化事件（QueuedEvent）
//!
//! 为生产者提供结构体形式的事件定义：事件名与默认优先级在类型上声明，
//! 参数即结构体本身的序列化结果。通常通过 `eventq_macros::queued_event` 宏实现。
//!
use serde::{Serialize, de::DeserializeOwned};

pub trait QueuedEvent: Serialize + DeserializeOwned + Send + Sync {
    /// 事件名（出队后用于匹配处理器）
    const NAME: &'static str;

    /// 事件声明的优先级；为 `None` 时使用引擎配置的默认优先级
    const PRIORITY: Option<&'static str> = None;
}
