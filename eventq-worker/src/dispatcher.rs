//! 处理器注册表与分发
//!
use crate::error::{WorkerError, WorkerResult};
use crate::handler::EventHandler;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use eventq_domain::message::Message;
use futures_util::{FutureExt, StreamExt, stream};
use std::sync::Arc;

/// 一条消息的分发结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: String,
    pub sequence: i64,
    /// 处理成功的处理器名（按名称排序）
    pub succeeded: Vec<String>,
    /// (处理器名, 失败原因)
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    /// 没有任何处理器订阅该事件
    pub fn is_unhandled(&self) -> bool {
        self.succeeded.is_empty() && self.failed.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = WorkerError> + '_ {
        self.failed.iter().map(|(handler, reason)| WorkerError::Handler {
            handler: handler.clone(),
            event: self.event.clone(),
            reason: reason.clone(),
        })
    }

    /// 未处理或任一处理器失败时返回错误
    pub fn into_result(self) -> WorkerResult<()> {
        if self.is_unhandled() {
            return Err(WorkerError::HandlerNotFound { event: self.event });
        }
        match self.errors().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// 处理器注册表：处理器名唯一，按事件名匹配
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<DashMap<String, Arc<dyn EventHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handlers(handlers: Vec<Arc<dyn EventHandler>>) -> WorkerResult<Self> {
        let registry = Self::new();
        for handler in handlers {
            registry.register(handler)?;
        }
        Ok(registry)
    }

    pub fn register(&self, handler: Arc<dyn EventHandler>) -> WorkerResult<()> {
        match self.handlers.entry(handler.handler_name().to_string()) {
            Entry::Occupied(e) => Err(WorkerError::AlreadyRegistered {
                handler: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                e.insert(handler);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handler_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// 订阅了 `event` 的处理器，按名称排序
    pub fn matching(&self, event: &str) -> Vec<Arc<dyn EventHandler>> {
        let mut matched: Vec<(String, Arc<dyn EventHandler>)> = self
            .handlers
            .iter()
            .filter(|e| e.value().handled_events().matches(event))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        matched.sort_by(|a, b| a.0.cmp(&b.0));
        matched.into_iter().map(|(_, h)| h).collect()
    }

    /// 把消息交给所有匹配的处理器，最多 `concurrency` 个并发执行
    pub async fn dispatch(&self, message: &Message, concurrency: usize) -> DispatchReport {
        let handlers = self.matching(message.event());
        let mut report = DispatchReport {
            event: message.event().to_string(),
            sequence: message.sequence(),
            ..Default::default()
        };

        if handlers.is_empty() {
            tracing::warn!(
                event = message.event(),
                partition = %message.partition_id(),
                sequence = message.sequence(),
                "no handler for event, message dropped"
            );
            return report;
        }

        let outcomes: Vec<(String, anyhow::Result<()>)> = stream::iter(handlers)
            .map(|h| async move {
                let name = h.handler_name().to_string();
                (name, h.handle(message).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .boxed()
            .await;

        for (name, outcome) in outcomes {
            match outcome {
                Ok(()) => report.succeeded.push(name),
                Err(err) => {
                    tracing::error!(
                        handler = %name,
                        event = message.event(),
                        sequence = message.sequence(),
                        error = %err,
                        "handler failed"
                    );
                    report.failed.push((name, format!("{err:#}")));
                }
            }
        }
        report.succeeded.sort();
        report.failed.sort();
        report
    }
}
