//! 事件处理器（EventHandler）
//!
//! 声明处理器订阅的事件名，并处理出队后的消息。
//!
use async_trait::async_trait;
use eventq_domain::event::QueuedEvent;
use eventq_domain::message::Message;
use std::marker::PhantomData;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEvents {
    One(String),
    Many(Vec<String>),
    All,
}

impl HandledEvents {
    pub fn matches(&self, event: &str) -> bool {
        match self {
            Self::One(name) => name == event,
            Self::Many(names) => names.iter().any(|n| n == event),
            Self::All => true,
        }
    }
}

/// 事件处理器
///
/// 消息在出队时已从 Broker 移除，处理失败只会被记录，不会重新入队。
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（注册时唯一，用于日志与失败报告）
    fn handler_name(&self) -> &str;
    fn handled_events(&self) -> HandledEvents;
    async fn handle(&self, message: &Message) -> anyhow::Result<()>;
}

#[async_trait]
impl<T> EventHandler for Arc<T>
where
    T: EventHandler + ?Sized,
{
    fn handler_name(&self) -> &str {
        (**self).handler_name()
    }

    fn handled_events(&self) -> HandledEvents {
        (**self).handled_events()
    }

    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        (**self).handle(message).await
    }
}

/// 以类型化事件为入参的处理器，配合 [`Typed`] 注册
#[async_trait]
pub trait TypedEventHandler<E: QueuedEvent>: Send + Sync {
    async fn handle_event(&self, event: E, message: &Message) -> anyhow::Result<()>;
}

/// 把 `TypedEventHandler<E>` 适配为只订阅 `E::NAME` 的 `EventHandler`
pub struct Typed<E, H> {
    name: String,
    handler: H,
    _event: PhantomData<fn() -> E>,
}

impl<E, H> Typed<E, H>
where
    E: QueuedEvent,
    H: TypedEventHandler<E>,
{
    pub fn new(name: impl Into<String>, handler: H) -> Self {
        Self {
            name: name.into(),
            handler,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E, H> EventHandler for Typed<E, H>
where
    E: QueuedEvent + 'static,
    H: TypedEventHandler<E> + 'static,
{
    fn handler_name(&self) -> &str {
        &self.name
    }

    fn handled_events(&self) -> HandledEvents {
        HandledEvents::One(E::NAME.to_string())
    }

    async fn handle(&self, message: &Message) -> anyhow::Result<()> {
        let event: E = message.params_as()?;
        self.handler.handle_event(event, message).await
    }
}
