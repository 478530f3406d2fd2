use proc_macro::TokenStream;

mod derive_utils;
mod naming;
mod queued_event;

/// 类型化事件宏
/// - 仅支持具名字段结构体：字段即事件参数
/// - 合并/追加派生：Debug, Clone, Serialize, Deserialize
/// - 自动实现 `::eventq_domain::event::QueuedEvent`
/// - 参数：`#[queued_event(name = "...", priority = "...")]`，均可省略；
///   `name` 缺省为类型名去掉 `Event` 后缀再转 snake_case（`UserSignedUpEvent` -> `user_signed_up`），
///   `priority` 缺省时由引擎使用默认优先级
#[proc_macro_attribute]
pub fn queued_event(attr: TokenStream, item: TokenStream) -> TokenStream {
    queued_event::expand(attr, item)
}
