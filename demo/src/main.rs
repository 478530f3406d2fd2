use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use eventq_domain::broker::InMemoryBroker;
use eventq_domain::config::QueueConfig;
use eventq_domain::delivery::DeliveryEngine;
use eventq_domain::message::Message;
use eventq_domain::registry::InMemoryPartitionRegistry;
use eventq_macros::queued_event;
use eventq_worker::handler::{EventHandler, HandledEvents, Typed, TypedEventHandler};
use eventq_worker::observability::{LogFormat, init_logging};
use eventq_worker::worker::{Worker, WorkerConfig};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[queued_event(priority = "high")]
struct PasswordResetEvent {
    user_id: u64,
    email: String,
}

#[queued_event(name = "report.generate", priority = "low")]
struct GenerateReport {
    kind: String,
    rows: Vec<u32>,
}

struct ResetMailer;

#[async_trait]
impl TypedEventHandler<PasswordResetEvent> for ResetMailer {
    async fn handle_event(&self, event: PasswordResetEvent, _message: &Message) -> AnyResult<()> {
        tracing::info!(user_id = event.user_id, email = %event.email, "sending reset mail");
        Ok(())
    }
}

/// 记录所有事件
struct AuditLog;

#[async_trait]
impl EventHandler for AuditLog {
    fn handler_name(&self) -> &str {
        "audit_log"
    }

    fn handled_events(&self) -> HandledEvents {
        HandledEvents::All
    }

    async fn handle(&self, message: &Message) -> AnyResult<()> {
        tracing::info!(
            event = message.event(),
            partition = %message.partition_id(),
            sequence = message.sequence(),
            "audit"
        );
        Ok(())
    }
}

/// `EVENTQ_CONFIG` 指向 TOML 文件时读取，`EVENTQ_ENV` 选择环境表
fn load_config() -> AnyResult<QueueConfig> {
    let Ok(path) = std::env::var("EVENTQ_CONFIG") else {
        return Ok(QueueConfig::default());
    };
    let environment = std::env::var("EVENTQ_ENV").ok();
    Ok(QueueConfig::load(path, environment.as_deref())?)
}

#[tokio::main]
async fn main() -> AnyResult<()> {
    let format = std::env::var("EVENTQ_LOG_FORMAT")
        .ok()
        .and_then(|v| v.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_logging(format);

    let config = load_config()?;
    let priorities = config.priority_list()?;

    let engine = Arc::new(
        DeliveryEngine::builder()
            .namer(config.namer()?)
            .broker(Arc::new(InMemoryBroker::new()))
            .registry(Arc::new(InMemoryPartitionRegistry::new()))
            .config(config.delivery_config()?)
            .build(),
    );

    // 跨优先级、跨日期的积压
    let now = Utc::now();
    engine
        .enqueue_event_at(
            &GenerateReport {
                kind: "daily".into(),
                rows: vec![1, 2, 3],
            },
            now - TimeDelta::days(2),
        )
        .await?;
    engine.enqueue_at("medium", "invoice_paid", &json!({"invoice": "inv-7"}), now - TimeDelta::days(1)).await?;
    engine
        .enqueue_event(&PasswordResetEvent {
            user_id: 42,
            email: "someone@example.com".into(),
        })
        .await?;
    engine.enqueue_default("newsletter_sent", &json!({"issue": 12})).await?;

    for (priority, status) in engine.status(&config.priorities).await? {
        tracing::info!(%priority, depth = status.depth, partitions = status.partitions.len(), "queue status");
    }

    let worker = Arc::new(
        Worker::builder()
            .engine(engine.clone())
            .handlers(vec![
                Arc::new(Typed::<PasswordResetEvent, _>::new("reset_mailer", ResetMailer))
                    as Arc<dyn EventHandler>,
                Arc::new(AuditLog) as Arc<dyn EventHandler>,
            ])?
            .priorities(priorities)
            .config(WorkerConfig {
                sweep_interval: Duration::from_millis(500),
                ..Default::default()
            })
            .build(),
    );

    let handle = worker.start();
    tokio::time::sleep(Duration::from_secs(1)).await;
    handle.shutdown();
    handle.join().await;

    let report = engine.sweep().await?;
    tracing::info!(
        examined = report.examined,
        dropped = report.dropped.len(),
        retained = report.retained,
        "final sweep"
    );

    engine.shutdown().await;
    Ok(())
}
