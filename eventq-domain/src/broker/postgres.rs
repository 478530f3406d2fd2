//! Postgres 版 Broker（PgBroker）
//!
//! 所有通道共用一张表，按 `(channel, sequence)` 建索引；
//! `pop` 使用 `FOR UPDATE SKIP LOCKED` 保证多个消费者并发时每条消息只被取走一次。
//!
use super::{Broker, ChannelStatus, Delivery};
use crate::error::{QueueError, QueueResult as Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS eventq_messages (
    sequence    BIGSERIAL PRIMARY KEY,
    channel     TEXT        NOT NULL,
    body        BYTEA       NOT NULL,
    enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS eventq_messages_channel_sequence_idx
    ON eventq_messages (channel, sequence)"#;

#[derive(Clone, Debug)]
pub struct PgBroker {
    pool: PgPool,
}

impl PgBroker {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect_url(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    /// 幂等建表
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    fn wrap(channel: &str, err: sqlx::Error) -> QueueError {
        QueueError::broker(channel, err)
    }
}

#[async_trait]
impl Broker for PgBroker {
    async fn connect(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn push(&self, channel: &str, body: &[u8]) -> Result<i64> {
        let row = sqlx::query(
            "INSERT INTO eventq_messages (channel, body) VALUES ($1, $2) RETURNING sequence",
        )
        .bind(channel)
        .bind(body)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::wrap(channel, e))?;

        Ok(row.try_get::<i64, _>("sequence")?)
    }

    async fn pop(&self, channel: &str) -> Result<Option<Delivery>> {
        let row = sqlx::query(
            r#"
            DELETE FROM eventq_messages
            WHERE sequence = (
                SELECT sequence FROM eventq_messages
                WHERE channel = $1
                ORDER BY sequence
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING sequence, body
            "#,
        )
        .bind(channel)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::wrap(channel, e))?;

        match row {
            Some(row) => Ok(Some(Delivery {
                sequence: row.try_get("sequence")?,
                body: row.try_get("body")?,
            })),
            None => Ok(None),
        }
    }

    async fn status(&self, channel: &str) -> Result<ChannelStatus> {
        let depth: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM eventq_messages WHERE channel = $1")
                .bind(channel)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| Self::wrap(channel, e))?;

        Ok(ChannelStatus {
            depth: depth.max(0) as u64,
            consumers: 0,
        })
    }

    // 通道只是表中的一组行，没有独立的存在形式；深度为 0 时无需删除任何东西。
    // 这里不执行 DELETE，避免与清理期间新写入的消息竞争。
    async fn delete_channel(&self, _channel: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
