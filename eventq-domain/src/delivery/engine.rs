use super::{PartitionStatus, PriorityStatus};
use crate::{
    broker::{Broker, BrokerAdapter},
    error::{QueueError, QueueResult as Result},
    event::QueuedEvent,
    message::{Envelope, Message, Params, to_params},
    partition::{PartitionId, PartitionNamer, Priority},
    registry::PartitionRegistry,
    sweeper::{CleanupSweeper, SweepPolicy, SweepReport},
};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

// 导入由 bon::Builder 生成的 typestate 模块与状态转换别名
use self::delivery_engine_builder::{IsUnset, SetAdapter, State as BuilderState};

/// 投递引擎配置
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// 生产者未指定优先级时使用
    pub default_priority: Priority,
    pub sweep_policy: SweepPolicy,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::from_static("medium"),
            sweep_policy: SweepPolicy::default(),
        }
    }
}

/// DeliveryEngine：
/// - 生产者侧：`enqueue*` 只在输入非法时返回错误，基础设施故障只记录日志；
/// - 消费者侧：`dequeue` 非阻塞，没有消息时返回 `None`；
/// - 持有 `BrokerAdapter`（连接与不可用通道状态）并负责其关闭。
#[derive(Builder)]
pub struct DeliveryEngine {
    #[builder(default)]
    namer: PartitionNamer,
    #[builder(setters(vis = "pub(crate)"))]
    adapter: BrokerAdapter,
    registry: Arc<dyn PartitionRegistry>,
    #[builder(default)]
    config: DeliveryConfig,
}

impl<S: BuilderState> DeliveryEngineBuilder<S> {
    /// 接收任意 Broker，内部包装为引擎独占的 `BrokerAdapter`
    pub fn broker(self, broker: Arc<dyn Broker>) -> DeliveryEngineBuilder<SetAdapter<S>>
    where
        <S as BuilderState>::Adapter: IsUnset,
    {
        self.adapter(BrokerAdapter::new(broker))
    }
}

impl DeliveryEngine {
    pub fn namer(&self) -> &PartitionNamer {
        &self.namer
    }

    pub fn adapter(&self) -> &BrokerAdapter {
        &self.adapter
    }

    pub fn registry(&self) -> &Arc<dyn PartitionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // 生产者
    // ---------------------------------------------------------------------

    pub async fn enqueue<P>(&self, priority: &str, event: &str, params: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.enqueue_at(priority, event, params, Utc::now()).await
    }

    /// 以指定时间入队（回放历史积压或测试跨日顺序时使用）
    pub async fn enqueue_at<P>(
        &self,
        priority: &str,
        event: &str,
        params: &P,
        at: DateTime<Utc>,
    ) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let priority = Priority::new(priority)?;
        let params = to_params(params)?;
        self.publish(&priority, event, params, at).await
    }

    /// 使用默认优先级入队
    pub async fn enqueue_default<P>(&self, event: &str, params: &P) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        self.enqueue_default_at(event, params, Utc::now()).await
    }

    pub async fn enqueue_default_at<P>(&self, event: &str, params: &P, at: DateTime<Utc>) -> Result<()>
    where
        P: Serialize + ?Sized,
    {
        let params = to_params(params)?;
        let priority = self.config.default_priority.clone();
        self.publish(&priority, event, params, at).await
    }

    pub async fn enqueue_event<E: QueuedEvent>(&self, event: &E) -> Result<()> {
        self.enqueue_event_at(event, Utc::now()).await
    }

    pub async fn enqueue_event_at<E: QueuedEvent>(&self, event: &E, at: DateTime<Utc>) -> Result<()> {
        let priority = match E::PRIORITY {
            Some(label) => Priority::new(label)?,
            None => self.config.default_priority.clone(),
        };
        let params = to_params(event)?;
        self.publish(&priority, E::NAME, params, at).await
    }

    async fn publish(
        &self,
        priority: &Priority,
        event: &str,
        params: Params,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if event.trim().is_empty() {
            return Err(QueueError::InvalidEvent {
                name: event.to_string(),
            });
        }

        let partition = self.namer.resolve(priority, at);
        let channel = self.namer.channel_name(&partition);
        let body = Envelope::new(event, params, at).encode()?;

        let Some(sequence) = self.adapter.push(&channel, &body).await else {
            tracing::warn!(%partition, event, "event dropped, broker channel unavailable");
            return Ok(());
        };

        if let Err(err) = self.registry.ensure(&partition).await {
            tracing::error!(%partition, error = %err, "failed to register partition");
        }

        tracing::debug!(%partition, event, sequence, "event enqueued");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // 消费者
    // ---------------------------------------------------------------------

    /// 按给定优先级顺序取下一条消息；全部为空时返回 `None`
    ///
    /// 只有优先级标签非法时返回错误。
    pub async fn dequeue<I, S>(&self, priorities: I) -> Result<Option<Message>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let priorities = Priority::parse_list(priorities)?;
        Ok(self.dequeue_from(&priorities).await)
    }

    /// 两层扫描：外层优先级（调用方顺序），内层分区（日期升序）
    pub async fn dequeue_from(&self, priorities: &[Priority]) -> Option<Message> {
        for priority in priorities {
            let partitions = match self.registry.list(priority).await {
                Ok(partitions) => partitions,
                Err(err) => {
                    tracing::error!(%priority, error = %err, "failed to list partitions, skipping priority");
                    continue;
                }
            };

            for partition in &partitions {
                if let Some(message) = self.pop_partition(partition).await {
                    return Some(message);
                }
            }
        }

        None
    }

    async fn pop_partition(&self, partition: &PartitionId) -> Option<Message> {
        let channel = self.namer.channel_name(partition);

        while let Some(delivery) = self.adapter.pop(&channel).await {
            let decoded = Envelope::decode(&delivery.body);
            self.acknowledge(partition, delivery.sequence).await;

            match decoded {
                Ok(envelope) => {
                    tracing::debug!(%partition, sequence = delivery.sequence, event = envelope.event(), "event dequeued");
                    return Some(Message::from_envelope(
                        partition.clone(),
                        delivery.sequence,
                        envelope,
                    ));
                }
                // 损坏的消息已被取出，丢弃后继续，避免永久卡住该分区
                Err(err) => {
                    tracing::warn!(%partition, sequence = delivery.sequence, error = %err, "discarding undecodable message");
                }
            }
        }

        None
    }

    async fn acknowledge(&self, partition: &PartitionId, sequence: i64) {
        if let Err(err) = self.registry.record_progress(partition, sequence).await {
            tracing::error!(%partition, sequence, error = %err, "failed to record progress");
        }
    }

    // ---------------------------------------------------------------------
    // 管理
    // ---------------------------------------------------------------------

    /// 各优先级的深度汇总，键为优先级标签
    pub async fn status<I, S>(&self, priorities: I) -> Result<BTreeMap<String, PriorityStatus>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let priorities = Priority::parse_list(priorities)?;
        let mut out = BTreeMap::new();

        for priority in priorities {
            let mut summary = PriorityStatus::default();
            let partitions = match self.registry.list(&priority).await {
                Ok(partitions) => partitions,
                Err(err) => {
                    tracing::error!(%priority, error = %err, "failed to list partitions");
                    Vec::new()
                }
            };

            for partition in partitions {
                let channel = self.namer.channel_name(&partition);
                let channel_status = self.adapter.status(&channel).await;
                let last_processed_sequence = match self.registry.get(&partition).await {
                    Ok(row) => row.map(|r| r.last_processed_sequence()).unwrap_or(0),
                    Err(err) => {
                        tracing::error!(%partition, error = %err, "failed to read registry row");
                        0
                    }
                };

                let status = channel_status.unwrap_or_default();
                summary.depth += status.depth;
                summary.partitions.push(PartitionStatus {
                    partition_id: partition,
                    depth: status.depth,
                    consumers: status.consumers,
                    last_processed_sequence,
                    available: channel_status.is_some(),
                });
            }

            out.insert(priority.to_string(), summary);
        }

        Ok(out)
    }

    pub fn sweeper(&self) -> CleanupSweeper {
        CleanupSweeper::new(
            self.namer.clone(),
            self.adapter.clone(),
            self.registry.clone(),
            self.config.sweep_policy,
        )
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweeper().sweep().await
    }

    /// 重置不可用通道并重新连接 Broker
    pub async fn reconnect(&self) -> Result<()> {
        self.adapter.reconnect().await
    }

    pub async fn shutdown(&self) {
        self.adapter.close().await;
        tracing::info!(namespace = self.namer.namespace(), "delivery engine shut down");
    }
}
