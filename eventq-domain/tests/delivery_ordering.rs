mod common;

use common::{ALL, Harness, days_ago, now};
use eventq_domain::broker::InMemoryBroker;
use eventq_domain::delivery::DeliveryEngine;
use eventq_domain::error::QueueError;
use eventq_domain::event::QueuedEvent;
use eventq_domain::partition::{PartitionId, PartitionNamer, Priority};
use eventq_domain::registry::{InMemoryPartitionRegistry, PartitionRegistry};
use eventq_macros::queued_event;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn priorities_dequeue_in_caller_order_same_day() {
    let h = Harness::new();
    h.engine.enqueue_at("low", "test_low", &json!({}), now()).await.unwrap();
    h.engine.enqueue_at("medium", "test_medium", &json!({}), now()).await.unwrap();
    h.engine.enqueue_at("high", "test_high", &json!({}), now()).await.unwrap();

    assert_eq!(h.drain(&ALL).await, vec!["test_high", "test_medium", "test_low"]);
    assert!(h.engine.dequeue(ALL).await.unwrap().is_none());
}

#[tokio::test]
async fn older_days_dequeue_first_within_priority() {
    let h = Harness::new();
    h.engine.enqueue_at("medium", "test_two_days_ago", &json!({}), days_ago(2)).await.unwrap();
    h.engine.enqueue_at("medium", "test_yesterday", &json!({}), days_ago(1)).await.unwrap();
    h.engine.enqueue_at("medium", "test_today", &json!({}), days_ago(0)).await.unwrap();

    assert_eq!(
        h.drain(&ALL).await,
        vec!["test_two_days_ago", "test_yesterday", "test_today"]
    );
}

#[tokio::test]
async fn priority_wins_over_older_day() {
    let h = Harness::new();
    h.engine.enqueue_at("low", "test_low", &json!({}), days_ago(0)).await.unwrap();
    h.engine.enqueue_at("high", "test_high", &json!({}), days_ago(1)).await.unwrap();
    h.engine.enqueue_at("medium", "test_medium", &json!({}), days_ago(2)).await.unwrap();

    assert_eq!(h.drain(&ALL).await, vec!["test_high", "test_medium", "test_low"]);
}

#[tokio::test]
async fn caller_list_defines_precedence() {
    let h = Harness::new();
    // low 的分区最旧，但列表顺序优先
    h.engine.enqueue_at("low", "old_low", &json!({}), days_ago(5)).await.unwrap();
    h.engine.enqueue_at("high", "new_high", &json!({}), now()).await.unwrap();

    let reversed = ["low", "medium", "high"];
    assert_eq!(h.drain(&reversed).await, vec!["old_low", "new_high"]);
}

#[tokio::test]
async fn later_day_enqueued_first_still_comes_second() {
    let h = Harness::new();
    for i in 0..3 {
        h.engine
            .enqueue_at("high", &format!("d2_{i}"), &json!({}), days_ago(1))
            .await
            .unwrap();
    }
    for i in 0..3 {
        h.engine
            .enqueue_at("high", &format!("d1_{i}"), &json!({}), days_ago(3))
            .await
            .unwrap();
    }

    // 同一天内保持 FIFO
    assert_eq!(
        h.drain(&["high"]).await,
        vec!["d1_0", "d1_1", "d1_2", "d2_0", "d2_1", "d2_2"]
    );
}

#[tokio::test]
async fn drains_to_empty_across_priorities_and_days() {
    let h = Harness::new();
    let mut n = 0;
    for (i, priority) in ALL.iter().enumerate() {
        for day in 0..4 {
            let at = days_ago(day * (i as i64 + 1));
            h.engine.enqueue_at(priority, "e", &json!({"n": n}), at).await.unwrap();
            n += 1;
        }
    }

    let mut seen = 0;
    while h.engine.dequeue(ALL).await.unwrap().is_some() {
        seen += 1;
    }
    assert_eq!(seen, n);
    assert!(h.engine.dequeue(ALL).await.unwrap().is_none());
}

#[tokio::test]
async fn unlisted_priorities_are_not_served() {
    let h = Harness::new();
    h.engine.enqueue_at("bulk", "import", &json!({}), now()).await.unwrap();

    assert!(h.engine.dequeue(ALL).await.unwrap().is_none());
    let message = h.engine.dequeue(["bulk"]).await.unwrap().unwrap();
    assert_eq!(message.event(), "import");
    assert_eq!(message.priority().as_str(), "bulk");
}

#[tokio::test]
async fn nested_params_survive_the_queue() {
    let h = Harness::new();
    let params = json!({
        "a": 1,
        "b": [1, 2, 3],
        "c": {"d": [{"e": "f"}], "g": null, "h": 1.5},
    });
    h.engine.enqueue("high", "nested", &params).await.unwrap();

    let message = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert_eq!(serde_json::Value::Object(message.params().clone()), params);
}

#[tokio::test]
async fn default_enqueue_uses_medium() {
    let h = Harness::new();
    h.engine.enqueue_default("fallback", &json!({"x": true})).await.unwrap();

    assert!(h.engine.dequeue(["high", "low"]).await.unwrap().is_none());
    let message = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert_eq!(message.priority().as_str(), "medium");
    assert_eq!(message.params()["x"], json!(true));
    assert!(h.engine.dequeue(ALL).await.unwrap().is_none());
}

#[tokio::test]
async fn default_enqueue_at_lands_in_the_given_day() {
    let h = Harness::new();
    h.engine.enqueue_default_at("today", &json!({}), now()).await.unwrap();
    h.engine.enqueue_default_at("backlog", &json!({}), days_ago(3)).await.unwrap();

    let medium = Priority::new("medium").unwrap();
    assert_eq!(
        h.registry.list(&medium).await.unwrap(),
        vec![
            PartitionId::new(medium.clone(), days_ago(3).date_naive()),
            PartitionId::new(medium.clone(), now().date_naive()),
        ]
    );
    assert_eq!(h.drain(&ALL).await, vec!["backlog", "today"]);
}

#[tokio::test]
async fn unit_params_are_empty() {
    let h = Harness::new();
    h.engine.enqueue("low", "ping", &()).await.unwrap();

    let message = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert!(message.params().is_empty());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_touching_the_broker() {
    let h = Harness::new();

    assert!(matches!(
        h.engine.enqueue("not valid", "e", &json!({})).await,
        Err(QueueError::InvalidPriority { .. })
    ));
    assert!(matches!(
        h.engine.enqueue("high", "  ", &json!({})).await,
        Err(QueueError::InvalidEvent { .. })
    ));
    assert!(matches!(
        h.engine.enqueue("high", "e", &json!([1, 2])).await,
        Err(QueueError::InvalidParams { .. })
    ));
    assert!(matches!(
        h.engine.dequeue(["high", ""]).await,
        Err(QueueError::InvalidPriority { .. })
    ));

    assert!(h.broker.channels().is_empty());
    assert!(h.registry.is_empty());
}

#[tokio::test]
async fn dequeue_records_progress() {
    let h = Harness::new();
    h.engine.enqueue_at("high", "a", &json!({}), now()).await.unwrap();
    h.engine.enqueue_at("high", "b", &json!({}), now()).await.unwrap();

    let partition = PartitionId::new(Priority::new("high").unwrap(), now().date_naive());
    let row = h.registry.get(&partition).await.unwrap().unwrap();
    assert_eq!(row.last_processed_sequence(), 0);

    let first = h.engine.dequeue(ALL).await.unwrap().unwrap();
    let second = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert!(second.sequence() > first.sequence());
    assert_eq!(second.partition_id(), &partition);

    let row = h.registry.get(&partition).await.unwrap().unwrap();
    assert_eq!(row.last_processed_sequence(), second.sequence());
}

#[tokio::test]
async fn corrupt_message_is_skipped() {
    use eventq_domain::broker::Broker;

    let h = Harness::new();
    let partition = h.engine.namer().resolve(&Priority::new("high").unwrap(), now());
    let channel = h.engine.namer().channel_name(&partition);

    // 无法解码的消息体排在 good 之前
    h.broker.push(&channel, b"not json").await.unwrap();
    h.registry.ensure(&partition).await.unwrap();
    h.engine.enqueue_at("high", "good", &json!({}), now()).await.unwrap();

    assert_eq!(h.drain(&ALL).await, vec!["good"]);
    let row = h.registry.get(&partition).await.unwrap().unwrap();
    assert!(row.last_processed_sequence() > 0);
}

#[tokio::test]
async fn status_reports_depth_per_priority() {
    let h = Harness::new();
    h.engine.enqueue_at("high", "a", &json!({}), days_ago(1)).await.unwrap();
    h.engine.enqueue_at("high", "b", &json!({}), now()).await.unwrap();
    h.engine.enqueue_at("high", "c", &json!({}), now()).await.unwrap();

    let status = h.engine.status(ALL).await.unwrap();
    assert_eq!(status["high"].depth, 3);
    assert_eq!(status["high"].partitions.len(), 2);
    assert_eq!(status["high"].partitions[0].partition_id.day(), days_ago(1).date_naive());
    assert_eq!(status["high"].partitions[0].depth, 1);
    assert!(status["medium"].is_empty());
    assert_eq!(status["high"].unavailable().count(), 0);
}

#[queued_event(priority = "high")]
struct UserSignedUpEvent {
    user_id: u64,
    tags: Vec<String>,
}

#[queued_event]
struct NewsletterSent {
    issue: u32,
}

#[tokio::test]
async fn typed_events_carry_name_and_priority() {
    let h = Harness::new();
    h.engine.enqueue_event(&NewsletterSent { issue: 9 }).await.unwrap();
    h.engine
        .enqueue_event(&UserSignedUpEvent {
            user_id: 42,
            tags: vec!["beta".into()],
        })
        .await
        .unwrap();

    let first = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert_eq!(first.event(), UserSignedUpEvent::NAME);
    assert_eq!(first.event(), "user_signed_up");
    let typed: UserSignedUpEvent = first.params_as().unwrap();
    assert_eq!(typed.user_id, 42);
    assert_eq!(typed.tags, vec!["beta"]);

    let second = h.engine.dequeue(ALL).await.unwrap().unwrap();
    assert_eq!(second.event(), "newsletter_sent");
    assert_eq!(second.priority().as_str(), "medium");
}

#[tokio::test]
async fn namespaces_sharing_a_broker_stay_isolated() {
    common::init_test_logging();
    let broker = InMemoryBroker::new();
    let engine = |namespace: &str| {
        DeliveryEngine::builder()
            .namer(PartitionNamer::new(namespace).unwrap())
            .broker(Arc::new(broker.clone()))
            .registry(Arc::new(InMemoryPartitionRegistry::new()))
            .build()
    };
    let shop = engine("shop");
    let shop_eu = engine("shop-eu");

    shop.enqueue_at("eu-high", "shop_private", &json!({}), now()).await.unwrap();
    shop_eu.enqueue_at("high", "shop_eu_own", &json!({}), now()).await.unwrap();
    assert_eq!(broker.channels().len(), 2);

    let theirs = shop_eu.dequeue(["high"]).await.unwrap().unwrap();
    assert_eq!(theirs.event(), "shop_eu_own");
    assert!(shop_eu.dequeue(["high"]).await.unwrap().is_none());

    let ours = shop.dequeue(["eu-high"]).await.unwrap().unwrap();
    assert_eq!(ours.event(), "shop_private");
}
