//! 消费 Worker
//!
//! 统一编排三个长驻任务：
//! - 消费：按优先级顺序出队并分发，空闲时指数退避；
//! - 清理：周期执行 `sweep`；
//! - 重连：存在不可用通道时周期执行 `reconnect`。
//!
use crate::dispatcher::{DispatchReport, HandlerRegistry};
use crate::error::WorkerResult;
use crate::handler::EventHandler;
use crate::observability::worker_span;
use bon::Builder;
use eventq_domain::delivery::DeliveryEngine;
use eventq_domain::partition::Priority;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::worker_builder::{IsUnset, SetRegistry, State as BuilderState};

/// Worker 配置
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// 队列为空时的初始等待
    pub poll_interval: Duration,
    /// 空闲退避的上限
    pub max_idle_backoff: Duration,
    pub sweep_interval: Duration,
    /// 检查不可用通道并重连的间隔
    pub reconnect_interval: Duration,
    /// 单条消息广播给多个处理器时的并发
    pub handler_concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            max_idle_backoff: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(3600),
            reconnect_interval: Duration::from_secs(30),
            handler_concurrency: 8,
        }
    }
}

#[derive(Builder)]
pub struct Worker {
    engine: Arc<DeliveryEngine>,
    registry: HandlerRegistry,
    /// 出队优先级顺序（第一个最高）
    priorities: Vec<Priority>,
    #[builder(default)]
    config: WorkerConfig,
}

impl<S: BuilderState> WorkerBuilder<S> {
    /// 由处理器列表构建注册表；处理器名重复时报错
    pub fn handlers(
        self,
        handlers: Vec<Arc<dyn EventHandler>>,
    ) -> WorkerResult<WorkerBuilder<SetRegistry<S>>>
    where
        <S as BuilderState>::Registry: IsUnset,
    {
        Ok(self.registry(HandlerRegistry::with_handlers(handlers)?))
    }
}

impl Worker {
    pub fn engine(&self) -> &Arc<DeliveryEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn priorities(&self) -> &[Priority] {
        &self.priorities
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// 取一条消息并分发；队列为空时返回 `None`
    pub async fn run_once(&self) -> Option<DispatchReport> {
        let message = self.engine.dequeue_from(&self.priorities).await?;
        Some(
            self.registry
                .dispatch(&message, self.config.handler_concurrency)
                .await,
        )
    }

    /// 持续处理直到队列为空，返回处理的消息数
    pub async fn run_until_idle(&self) -> usize {
        let mut processed = 0;
        while self.run_once().await.is_some() {
            processed += 1;
        }
        processed
    }

    /// 启动长驻任务，返回可用于关闭/等待的句柄
    pub fn start(self: Arc<Self>) -> WorkerHandle {
        let token = CancellationToken::new();
        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(3);
        let namespace = self.engine.namer().namespace().to_string();

        // sweep（周期任务）
        {
            let engine = self.engine.clone();
            let span = worker_span("sweep", &namespace);
            tasks.push(Self::spawn_periodic(
                token.clone(),
                self.config.sweep_interval,
                move || {
                    let engine = engine.clone();
                    async move {
                        if let Err(err) = engine.sweep().await {
                            tracing::error!(error = %err, "sweep failed");
                        }
                    }
                    .instrument(span.clone())
                },
            ));
        }

        // reconnect（周期任务）
        {
            let engine = self.engine.clone();
            let span = worker_span("reconnect", &namespace);
            tasks.push(Self::spawn_periodic(
                token.clone(),
                self.config.reconnect_interval,
                move || {
                    let engine = engine.clone();
                    async move {
                        let unusable = engine.adapter().unusable_channels();
                        if unusable.is_empty() {
                            return;
                        }
                        tracing::info!(channels = ?unusable, "reconnecting broker");
                        if let Err(err) = engine.reconnect().await {
                            tracing::error!(error = %err, "reconnect failed");
                        }
                    }
                    .instrument(span.clone())
                },
            ));
        }

        // consume（长循环）
        tasks.push(tokio::spawn(
            Self::consume_loop(self.clone(), token.clone())
                .instrument(worker_span("consume", &namespace)),
        ));

        tracing::info!(namespace = %namespace, priorities = ?self.priorities, "worker started");
        WorkerHandle { token, tasks }
    }

    /// 周期任务的最小间隔；`tokio::time::interval` 不接受零周期
    const MIN_PERIOD: Duration = Duration::from_millis(1);

    fn spawn_periodic<F, Fut>(
        token: CancellationToken,
        interval: Duration,
        mut f: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval.max(Self::MIN_PERIOD));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // 首个 tick 立即完成，跳过以免启动时就执行
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => f().await,
                }
            }
        })
    }

    async fn consume_loop(self: Arc<Self>, token: CancellationToken) {
        let mut idle = self.config.poll_interval;

        loop {
            if token.is_cancelled() {
                break;
            }

            match self.run_once().await {
                Some(report) => {
                    idle = self.config.poll_interval;
                    tracing::debug!(
                        event = %report.event,
                        sequence = report.sequence,
                        succeeded = report.succeeded.len(),
                        failed = report.failed.len(),
                        "message dispatched"
                    );
                }
                None => {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = time::sleep(idle) => {}
                    }
                    idle = (idle * 2).min(self.config.max_idle_backoff);
                }
            }
        }

        tracing::info!("consume loop stopped");
    }
}

/// Worker 运行句柄：用于优雅关闭与等待任务结束
pub struct WorkerHandle {
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn join(mut self) {
        let tasks = std::mem::take(&mut self.tasks);

        for t in tasks {
            if let Err(err) = t.await {
                tracing::error!(error = %err, "worker task panicked");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
