#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use eventq_domain::broker::InMemoryBroker;
use eventq_domain::delivery::DeliveryEngine;
use eventq_domain::registry::InMemoryPartitionRegistry;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// 测试日志：`RUST_LOG` 未设置时只输出 warn 以上
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub const ALL: [&str; 3] = ["high", "medium", "low"];

pub struct Harness {
    pub engine: DeliveryEngine,
    pub broker: InMemoryBroker,
    pub registry: InMemoryPartitionRegistry,
}

impl Harness {
    pub fn new() -> Self {
        init_test_logging();
        let broker = InMemoryBroker::new();
        let registry = InMemoryPartitionRegistry::new();
        let engine = DeliveryEngine::builder()
            .broker(Arc::new(broker.clone()))
            .registry(Arc::new(registry.clone()))
            .build();
        Self {
            engine,
            broker,
            registry,
        }
    }

    /// 依次出队直到为空，返回事件名
    pub async fn drain(&self, priorities: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(message) = self.engine.dequeue(priorities).await.unwrap() {
            out.push(message.event().to_string());
        }
        out
    }
}
