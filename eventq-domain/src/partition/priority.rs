use crate::error::{QueueError, QueueResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_LABEL_LEN: usize = 64;

/// 优先级标签
///
/// 核心不内置任何排序：出队时调用方给出的列表顺序即优先级顺序。
/// 标签会出现在分区标识与通道名中，因此只允许 `[A-Za-z0-9_-]`。
///
/// # 示例
///
/// ```
/// use eventq_domain::partition::Priority;
///
/// let high = Priority::new("high").unwrap();
/// assert_eq!(high.as_str(), "high");
/// assert!(Priority::new("no spaces").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Priority(String);

impl Priority {
    pub fn new(label: impl Into<String>) -> QueueResult<Self> {
        let label = label.into();
        Self::validate(&label)?;
        Ok(Self(label))
    }

    /// 内置默认值使用，调用方需保证标签合法
    pub(crate) fn from_static(label: &'static str) -> Self {
        debug_assert!(Self::validate(label).is_ok());
        Self(label.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 将一组原始标签解析为优先级列表，保持顺序
    pub fn parse_list<I, S>(labels: I) -> QueueResult<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        labels
            .into_iter()
            .map(|l| Self::new(l.as_ref()))
            .collect()
    }

    fn validate(label: &str) -> QueueResult<()> {
        let invalid = |reason: &str| QueueError::InvalidPriority {
            label: label.to_string(),
            reason: reason.to_string(),
        };

        if label.is_empty() {
            return Err(invalid("empty label"));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(invalid("label longer than 64 characters"));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("only [A-Za-z0-9_-] allowed"));
        }
        Ok(())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Priority {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Priority {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for String {
    fn from(value: Priority) -> Self {
        value.0
    }
}

impl AsRef<str> for Priority {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_labels() {
        for label in ["high", "medium", "low", "bulk_import", "p-0"] {
            assert_eq!(Priority::new(label).unwrap().as_str(), label);
        }
    }

    #[test]
    fn rejects_bad_labels() {
        assert!(Priority::new("").is_err());
        assert!(Priority::new("a b").is_err());
        assert!(Priority::new("a.b").is_err());
        assert!(Priority::new("x".repeat(65)).is_err());

        match Priority::new("hi!").unwrap_err() {
            QueueError::InvalidPriority { label, .. } => assert_eq!(label, "hi!"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn parse_list_keeps_caller_order() {
        let list = Priority::parse_list(["low", "high", "medium"]).unwrap();
        let labels: Vec<&str> = list.iter().map(Priority::as_str).collect();
        assert_eq!(labels, vec!["low", "high", "medium"]);
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let p: Priority = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(p.as_str(), "high");
        assert!(serde_json::from_str::<Priority>("\"has space\"").is_err());
    }
}
