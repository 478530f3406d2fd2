use super::Priority;
use crate::error::{QueueError, QueueResult};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const DAY_FORMAT: &str = "%Y-%m-%d";

/// 分区标识：`(priority, day)`，文本形式为 `{priority}_{YYYY-MM-DD}`
///
/// 日期部分不含 `_`，因此按最后一个 `_` 切分即可无歧义地还原。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PartitionId {
    priority: Priority,
    day: NaiveDate,
}

impl PartitionId {
    pub fn new(priority: Priority, day: NaiveDate) -> Self {
        Self { priority, day }
    }

    pub fn priority(&self) -> &Priority {
        &self.priority
    }

    pub fn day(&self) -> NaiveDate {
        self.day
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.priority, self.day.format(DAY_FORMAT))
    }
}

impl FromStr for PartitionId {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (priority, day) = s.rsplit_once('_').ok_or_else(|| QueueError::InvalidPartition {
            reason: format!("missing day suffix in {s:?}"),
        })?;

        Ok(Self {
            priority: Priority::new(priority)?,
            day: NaiveDate::parse_from_str(day, DAY_FORMAT)?,
        })
    }
}

impl TryFrom<String> for PartitionId {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PartitionId> for String {
    fn from(value: PartitionId) -> Self {
        value.to_string()
    }
}

/// 分区命名器
///
/// - `resolve`：纯函数，`(priority, at)` → `PartitionId`，同一天总是得到同一标识；
/// - `channel_name`：在分区标识前加上命名空间，使多个部署可共享同一个 Broker。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionNamer {
    namespace: String,
}

impl PartitionNamer {
    pub fn new(namespace: impl Into<String>) -> QueueResult<Self> {
        let namespace = namespace.into();
        if namespace.is_empty()
            || !namespace
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
        {
            return Err(QueueError::config(format!(
                "invalid namespace {namespace:?}: only [A-Za-z0-9_.-] allowed"
            )));
        }
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// 分区所属的自然日（UTC）
    pub fn today(&self, at: DateTime<Utc>) -> NaiveDate {
        at.date_naive()
    }

    pub fn resolve(&self, priority: &Priority, at: DateTime<Utc>) -> PartitionId {
        PartitionId::new(priority.clone(), self.today(at))
    }

    /// 通道名为 `{namespace}.{partition}`；优先级标签不含 `.`，最后一个 `.` 即为分界
    pub fn channel_name(&self, partition: &PartitionId) -> String {
        format!("{}.{}", self.namespace, partition)
    }
}

impl Default for PartitionNamer {
    fn default() -> Self {
        Self {
            namespace: "eventq".to_string(),
        }
    }
}
