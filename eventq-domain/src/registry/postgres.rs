//! Postgres 版登记簿（PgPartitionRegistry）
//!
//! 以 `(namespace, partition_id)` 为主键，多个部署可共用同一张表。
//! - `ensure`：`ON CONFLICT DO NOTHING`；
//! - `record_progress`：单条 `UPDATE ... GREATEST(...)`，并发写入者之间无需读-改-写。
//!
use super::{PartitionRegistry, RegistryRow};
use crate::{
    error::{QueueError, QueueResult as Result},
    partition::{PartitionId, Priority},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS eventq_partitions (
    namespace               TEXT        NOT NULL,
    partition_id            TEXT        NOT NULL,
    priority                TEXT        NOT NULL,
    day                     DATE        NOT NULL,
    last_processed_sequence BIGINT      NOT NULL DEFAULT 0,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (namespace, partition_id)
)"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS eventq_partitions_priority_day_idx
    ON eventq_partitions (namespace, priority, day)"#;

const SELECT_COLUMNS: &str =
    "partition_id, last_processed_sequence, created_at, updated_at FROM eventq_partitions";

#[derive(Clone, Debug)]
pub struct PgPartitionRegistry {
    pool: PgPool,
    namespace: String,
}

impl PgPartitionRegistry {
    pub fn new(pool: PgPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// 幂等建表
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
        Ok(())
    }

    fn row_from(row: &PgRow) -> Result<RegistryRow> {
        let partition_id: String = row.try_get("partition_id")?;
        let last_processed_sequence: i64 = row.try_get("last_processed_sequence")?;
        let created_at: DateTime<Utc> = row.try_get("created_at")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(RegistryRow::builder()
            .partition_id(partition_id.parse()?)
            .last_processed_sequence(last_processed_sequence)
            .created_at(created_at)
            .updated_at(updated_at)
            .build())
    }
}

fn registry_err(err: sqlx::Error) -> QueueError {
    QueueError::registry(err)
}

#[async_trait]
impl PartitionRegistry for PgPartitionRegistry {
    async fn ensure(&self, partition: &PartitionId) -> Result<()> {
        let day: NaiveDate = partition.day();
        sqlx::query(
            r#"
            INSERT INTO eventq_partitions (namespace, partition_id, priority, day)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (namespace, partition_id) DO NOTHING
            "#,
        )
        .bind(&self.namespace)
        .bind(partition.to_string())
        .bind(partition.priority().as_str())
        .bind(day)
        .execute(&self.pool)
        .await
        .map_err(registry_err)?;
        Ok(())
    }

    async fn record_progress(&self, partition: &PartitionId, sequence: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE eventq_partitions
            SET last_processed_sequence = GREATEST(last_processed_sequence, $3),
                updated_at = now()
            WHERE namespace = $1 AND partition_id = $2
            "#,
        )
        .bind(&self.namespace)
        .bind(partition.to_string())
        .bind(sequence)
        .execute(&self.pool)
        .await
        .map_err(registry_err)?;
        Ok(())
    }

    async fn list(&self, priority: &Priority) -> Result<Vec<PartitionId>> {
        let rows = sqlx::query(
            r#"
            SELECT partition_id FROM eventq_partitions
            WHERE namespace = $1 AND priority = $2
            ORDER BY day ASC
            "#,
        )
        .bind(&self.namespace)
        .bind(priority.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(registry_err)?;

        rows.iter()
            .map(|row| -> Result<PartitionId> {
                let id: String = row.try_get("partition_id")?;
                id.parse()
            })
            .collect()
    }

    async fn get(&self, partition: &PartitionId) -> Result<Option<RegistryRow>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} WHERE namespace = $1 AND partition_id = $2"
        ))
        .bind(&self.namespace)
        .bind(partition.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(registry_err)?;

        row.as_ref().map(Self::row_from).transpose()
    }

    async fn rows(&self) -> Result<Vec<RegistryRow>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} WHERE namespace = $1 ORDER BY priority, day"
        ))
        .bind(&self.namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(registry_err)?;

        rows.iter().map(Self::row_from).collect()
    }

    async fn drop_partition(&self, partition: &PartitionId) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM eventq_partitions WHERE namespace = $1 AND partition_id = $2")
                .bind(&self.namespace)
                .bind(partition.to_string())
                .execute(&self.pool)
                .await
                .map_err(registry_err)?;
        Ok(result.rows_affected() > 0)
    }
}
