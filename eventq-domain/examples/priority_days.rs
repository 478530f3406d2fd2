//! 演示：跨优先级、跨自然日的出队顺序，以及清理器的作用
//!
//! 运行：`cargo run -p eventq-domain --example priority_days`
use anyhow::Result as AnyResult;
use chrono::{Duration, Utc};
use eventq_domain::broker::InMemoryBroker;
use eventq_domain::delivery::DeliveryEngine;
use eventq_domain::registry::InMemoryPartitionRegistry;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const PRIORITIES: [&str; 3] = ["high", "medium", "low"];

#[tokio::main]
async fn main() -> AnyResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let engine = DeliveryEngine::builder()
        .broker(Arc::new(InMemoryBroker::new()))
        .registry(Arc::new(InMemoryPartitionRegistry::new()))
        .build();

    let now = Utc::now();
    // 故意先写较新的日期
    engine.enqueue_at("low", "report_today", &json!({"rows": 10}), now).await?;
    engine
        .enqueue_at("low", "report_backlog", &json!({"rows": [1, 2, 3]}), now - Duration::days(2))
        .await?;
    engine
        .enqueue_at("high", "password_reset", &json!({"user_id": 7}), now - Duration::days(1))
        .await?;
    engine.enqueue_default("newsletter", &json!({"issue": 12})).await?;

    for (priority, status) in engine.status(PRIORITIES).await? {
        println!("{priority:>6}: depth={} partitions={}", status.depth, status.partitions.len());
    }

    while let Some(message) = engine.dequeue(PRIORITIES).await? {
        println!(
            "{} <- {} #{} {}",
            message.event(),
            message.partition_id(),
            message.sequence(),
            serde_json::Value::Object(message.params().clone())
        );
    }

    let report = engine.sweep().await?;
    println!(
        "swept: examined={} dropped={} retained={}",
        report.examined,
        report.dropped.len(),
        report.retained
    );

    engine.shutdown().await;
    Ok(())
}
