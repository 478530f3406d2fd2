//! 队列配置（QueueConfig）
//!
//! 从 TOML 读取，支持两种形状：
//! - 平铺：顶层直接是各字段；
//! - 分环境：`[development]`、`[production]` 等表，按环境名选择其一。
//!
//! ```toml
//! [production]
//! namespace = "shop"
//! broker_url = "postgres://queue@db/shop"
//! priorities = ["high", "medium", "low"]
//! ```
//!
use crate::{
    delivery::DeliveryConfig,
    error::{QueueError, QueueResult as Result},
    partition::{PartitionNamer, Priority},
    sweeper::SweepPolicy,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// 应用标识，作为通道名前缀隔离不同部署
    pub namespace: String,
    /// Broker 连接地址
    pub broker_url: Option<String>,
    /// 登记簿连接地址；缺省时与 `broker_url` 相同
    pub registry_url: Option<String>,
    /// 生产者未指定优先级时使用
    pub default_priority: String,
    /// 消费者出队时的优先级顺序（第一个最高）
    pub priorities: Vec<String>,
    /// 清理时保留当天分区
    pub retain_current_day: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            namespace: "eventq".to_string(),
            broker_url: None,
            registry_url: None,
            default_priority: "medium".to_string(),
            priorities: vec!["high".into(), "medium".into(), "low".into()],
            retain_current_day: false,
        }
    }
}

impl QueueConfig {
    /// 解析平铺形状的 TOML
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// 解析分环境形状的 TOML，并选择 `environment` 对应的表
    pub fn from_toml_env(source: &str, environment: &str) -> Result<Self> {
        let mut table: toml::Table = toml::from_str(source)?;
        let section = table.remove(environment).ok_or_else(|| {
            QueueError::config(format!("environment {environment:?} not found"))
        })?;
        let config: Self = section.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件读取；`environment` 为 `None` 时按平铺形状解析
    pub fn load(path: impl AsRef<Path>, environment: Option<&str>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        match environment {
            Some(env) => Self::from_toml_env(&source, env),
            None => Self::from_toml_str(&source),
        }
    }

    pub fn validate(&self) -> Result<()> {
        PartitionNamer::new(&self.namespace)?;
        Priority::new(&self.default_priority)?;
        if self.priorities.is_empty() {
            return Err(QueueError::config("priorities must not be empty"));
        }
        let list = Priority::parse_list(&self.priorities)?;
        for (i, p) in list.iter().enumerate() {
            if list[..i].contains(p) {
                return Err(QueueError::config(format!("duplicate priority {p:?}")));
            }
        }
        Ok(())
    }

    pub fn namer(&self) -> Result<PartitionNamer> {
        PartitionNamer::new(&self.namespace)
    }

    pub fn priority_list(&self) -> Result<Vec<Priority>> {
        Priority::parse_list(&self.priorities)
    }

    pub fn default_priority(&self) -> Result<Priority> {
        Priority::new(&self.default_priority)
    }

    pub fn sweep_policy(&self) -> SweepPolicy {
        SweepPolicy {
            retain_current_day: self.retain_current_day,
        }
    }

    pub fn registry_url(&self) -> Option<&str> {
        self.registry_url.as_deref().or(self.broker_url.as_deref())
    }

    pub fn delivery_config(&self) -> Result<DeliveryConfig> {
        Ok(DeliveryConfig {
            default_priority: self.default_priority()?,
            sweep_policy: self.sweep_policy(),
        })
    }
}
