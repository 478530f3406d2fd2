//! 清理器（CleanupSweeper）
//!
//! 对照 Broker 的实际通道深度核对登记簿，删除已排空分区的登记行与通道。
//! - 深度在删除前立即读取；删行之后再读一次，期间若有消息写入则把登记行补回；
//! - Broker 只删除空通道，删除之后的写入会重新创建通道，入队也会重新登记；
//! - `drop_partition` 返回 `false` 表示另一个清理器已删除该行，视为正常；
//! - 通道删除失败不影响结果，空的残留通道无害。
//!
use crate::{
    broker::BrokerAdapter,
    error::QueueResult as Result,
    partition::{PartitionId, PartitionNamer},
    registry::{PartitionRegistry, RegistryRow},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 清理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepPolicy {
    /// 为 `true` 时不清理当天（及以后）的分区，即使深度为 0
    pub retain_current_day: bool,
}

/// 一次清理的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// 检查过的登记行数
    pub examined: usize,
    /// 已删除登记行的分区
    pub dropped: Vec<PartitionId>,
    /// 保留的分区数（仍有消息、当天分区或通道不可达）
    pub retained: usize,
    /// 通道删除失败次数（非致命）
    pub channel_delete_failures: usize,
    /// 非致命错误
    pub errors: Vec<String>,
}

impl SweepReport {
    pub fn merge(&mut self, other: Self) {
        self.examined += other.examined;
        self.dropped.extend(other.dropped);
        self.retained += other.retained;
        self.channel_delete_failures += other.channel_delete_failures;
        self.errors.extend(other.errors);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

enum Outcome {
    Dropped,
    Retained,
    /// 行已被并发删除
    Gone,
}

pub struct CleanupSweeper {
    namer: PartitionNamer,
    adapter: BrokerAdapter,
    registry: Arc<dyn PartitionRegistry>,
    policy: SweepPolicy,
}

impl CleanupSweeper {
    pub fn new(
        namer: PartitionNamer,
        adapter: BrokerAdapter,
        registry: Arc<dyn PartitionRegistry>,
        policy: SweepPolicy,
    ) -> Self {
        Self {
            namer,
            adapter,
            registry,
            policy,
        }
    }

    pub fn policy(&self) -> SweepPolicy {
        self.policy
    }

    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// 以 `now` 作为“今天”的依据执行清理
    ///
    /// # Errors
    ///
    /// 仅当无法读取登记簿时返回错误；单个分区的失败记录在报告中。
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let rows = self.registry.rows().await?;
        let mut report = SweepReport {
            examined: rows.len(),
            ..Default::default()
        };

        for row in rows {
            match self.sweep_row(&row, now, &mut report).await {
                Outcome::Dropped => report.dropped.push(row.partition_id().clone()),
                Outcome::Retained => report.retained += 1,
                Outcome::Gone => {}
            }
        }

        tracing::info!(
            examined = report.examined,
            dropped = report.dropped.len(),
            retained = report.retained,
            errors = report.errors.len(),
            "sweep finished"
        );
        Ok(report)
    }

    async fn sweep_row(
        &self,
        row: &RegistryRow,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Outcome {
        let partition = row.partition_id();

        if self.policy.retain_current_day && partition.day() >= self.namer.today(now) {
            return Outcome::Retained;
        }

        let channel = self.namer.channel_name(partition);
        let Some(status) = self.adapter.status(&channel).await else {
            report
                .errors
                .push(format!("{partition}: channel {channel} unavailable"));
            return Outcome::Retained;
        };

        if status.depth > 0 {
            return Outcome::Retained;
        }

        match self.registry.drop_partition(partition).await {
            Ok(true) => {}
            Ok(false) => return Outcome::Gone,
            Err(err) => {
                tracing::error!(%partition, error = %err, "failed to drop registry row");
                report.errors.push(format!("{partition}: {err}"));
                return Outcome::Retained;
            }
        }

        if !self.adapter.delete_channel(&channel).await {
            report.channel_delete_failures += 1;
        }

        // 读深度与删行之间可能有新消息写入；此时把行补回，保证有消息的通道必有登记
        let after = self.adapter.status(&channel).await;
        if after.is_none_or(|status| status.depth > 0) {
            if let Err(err) = self.registry.ensure(partition).await {
                tracing::error!(%partition, error = %err, "failed to restore registry row");
                report.errors.push(format!("{partition}: {err}"));
            }
            tracing::debug!(%partition, "message arrived during sweep, partition kept");
            return Outcome::Retained;
        }

        tracing::debug!(%partition, last_processed_sequence = row.last_processed_sequence(), "partition swept");
        Outcome::Dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broker, InMemoryBroker};
    use crate::partition::Priority;
    use crate::registry::InMemoryPartitionRegistry;
    use chrono::{Duration, TimeZone};

    struct Fixture {
        broker: InMemoryBroker,
        registry: InMemoryPartitionRegistry,
        namer: PartitionNamer,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                broker: InMemoryBroker::new(),
                registry: InMemoryPartitionRegistry::new(),
                namer: PartitionNamer::default(),
            }
        }

        fn sweeper(&self, policy: SweepPolicy) -> CleanupSweeper {
            CleanupSweeper::new(
                self.namer.clone(),
                BrokerAdapter::new(Arc::new(self.broker.clone())),
                Arc::new(self.registry.clone()),
                policy,
            )
        }

        async fn seed(&self, day: DateTime<Utc>, messages: usize) -> PartitionId {
            let id = self.namer.resolve(&Priority::new("low").unwrap(), day);
            let channel = self.namer.channel_name(&id);
            for _ in 0..messages {
                self.broker.push(&channel, b"{}").await.unwrap();
            }
            // 空通道也要真实存在，以便验证通道删除
            if messages == 0 {
                self.broker.push(&channel, b"{}").await.unwrap();
                self.broker.pop(&channel).await.unwrap();
            }
            self.registry.ensure(&id).await.unwrap();
            id
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn drops_only_empty_partitions() {
        let fx = Fixture::new();
        let full = fx.seed(now() - Duration::days(2), 1).await;
        let empty = fx.seed(now() - Duration::days(1), 0).await;

        let report = fx.sweeper(SweepPolicy::default()).sweep_at(now()).await.unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.dropped, vec![empty.clone()]);
        assert_eq!(report.retained, 1);
        assert!(!report.has_errors());
        assert!(fx.registry.get(&empty).await.unwrap().is_none());
        assert!(fx.registry.get(&full).await.unwrap().is_some());
        assert!(!fx.broker.has_channel(&fx.namer.channel_name(&empty)));
    }

    #[tokio::test]
    async fn empty_current_day_partition_is_dropped_by_default() {
        let fx = Fixture::new();
        let today = fx.seed(now(), 0).await;

        let report = fx.sweeper(SweepPolicy::default()).sweep_at(now()).await.unwrap();
        assert_eq!(report.dropped, vec![today]);
    }

    #[tokio::test]
    async fn retain_current_day_keeps_today() {
        let fx = Fixture::new();
        let today = fx.seed(now(), 0).await;
        let yesterday = fx.seed(now() - Duration::days(1), 0).await;

        let policy = SweepPolicy {
            retain_current_day: true,
        };
        let report = fx.sweeper(policy).sweep_at(now()).await.unwrap();

        assert_eq!(report.dropped, vec![yesterday]);
        assert_eq!(report.retained, 1);
        assert!(fx.registry.get(&today).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn sweep_is_idempotent() {
        let fx = Fixture::new();
        fx.seed(now() - Duration::days(3), 0).await;
        let sweeper = fx.sweeper(SweepPolicy::default());

        let first = sweeper.sweep_at(now()).await.unwrap();
        let second = sweeper.sweep_at(now()).await.unwrap();
        assert_eq!(first.dropped.len(), 1);
        assert_eq!(second, SweepReport::default());
    }

    #[test]
    fn reports_merge() {
        let mut a = SweepReport {
            examined: 2,
            retained: 1,
            errors: vec!["x".into()],
            ..Default::default()
        };
        a.merge(SweepReport {
            examined: 3,
            channel_delete_failures: 1,
            ..Default::default()
        });
        assert_eq!(a.examined, 5);
        assert_eq!(a.retained, 1);
        assert_eq!(a.channel_delete_failures, 1);
        assert!(a.has_errors());
    }
}
