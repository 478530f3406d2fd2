//! 消息模型与编解码
//!
//! Broker 中存放的消息体是 `{event, params, enqueued_at}` 的 JSON 编码；
//! 出队后与分区信息、Broker 位点组合成对外的 `Message`。
//!
use crate::{
    error::{QueueError, QueueResult},
    partition::{PartitionId, Priority},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

/// 事件参数：任意可序列化的键值结构（支持嵌套数组与对象）
pub type Params = serde_json::Map<String, Value>;

/// 把任意可序列化的值转换为 `Params`
///
/// 只接受对象；`null`/`()` 视为空参数，其它形状视为非法输入。
pub fn to_params<P>(params: &P) -> QueueResult<Params>
where
    P: Serialize + ?Sized,
{
    match serde_json::to_value(params)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Params::new()),
        other => Err(QueueError::InvalidParams {
            reason: format!("params must serialize to a map, got {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

/// Broker 消息体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    event: String,
    #[serde(default)]
    params: Params,
    enqueued_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, params: Params, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            event: event.into(),
            params,
            enqueued_at,
        }
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn encode(&self) -> QueueResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(body: &[u8]) -> QueueResult<Self> {
        Ok(serde_json::from_slice(body)?)
    }
}

/// 出队得到的消息
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    priority: Priority,
    partition_id: PartitionId,
    /// Broker 分配的位点
    sequence: i64,
    event: String,
    params: Params,
    enqueued_at: DateTime<Utc>,
}

impl Message {
    pub fn from_envelope(partition_id: PartitionId, sequence: i64, envelope: Envelope) -> Self {
        Self {
            priority: partition_id.priority().clone(),
            partition_id,
            sequence,
            event: envelope.event,
            params: envelope.params,
            enqueued_at: envelope.enqueued_at,
        }
    }

    pub fn priority(&self) -> &Priority {
        &self.priority
    }

    pub fn partition_id(&self) -> &PartitionId {
        &self.partition_id
    }

    pub fn sequence(&self) -> i64 {
        self.sequence
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    pub fn into_params(self) -> Params {
        self.params
    }

    /// 将参数反序列化为具体类型（例如由 `#[queued_event]` 定义的事件结构体）
    pub fn params_as<T>(&self) -> QueueResult<T>
    where
        T: DeserializeOwned,
    {
        Ok(serde_json::from_value(Value::Object(self.params.clone()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn nested_params_roundtrip() {
        let params = to_params(&json!({
            "a": 1,
            "b": [1, 2, 3],
            "c": { "d": [ { "e": null }, "f", 2.5 ], "g": true }
        }))
        .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        let body = Envelope::new("test", params.clone(), at).encode().unwrap();
        let back = Envelope::decode(&body).unwrap();

        assert_eq!(back.event(), "test");
        assert_eq!(back.params(), &params);
        assert_eq!(back.enqueued_at(), at);
    }

    #[test]
    fn unit_and_null_are_empty_params() {
        assert!(to_params(&()).unwrap().is_empty());
        assert!(to_params(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn non_map_params_are_rejected() {
        let err = to_params(&vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, QueueError::InvalidParams { .. }));
        assert!(to_params("text").is_err());
    }

    #[test]
    fn non_string_keys_are_a_serde_error() {
        let mut m = BTreeMap::new();
        m.insert((1, 2), "tuple key");
        assert!(matches!(to_params(&m), Err(QueueError::Serde { .. })));
    }

    #[test]
    fn corrupt_body_fails_to_decode() {
        assert!(Envelope::decode(b"\x00not json").is_err());
        assert!(Envelope::decode(br#"{"params":{}}"#).is_err());
    }

    #[test]
    fn params_as_typed_struct() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Signup {
            user_id: u64,
            tags: Vec<String>,
        }

        let id: PartitionId = "high_2024-05-01".parse().unwrap();
        let env = Envelope::new(
            "signup",
            to_params(&json!({"user_id": 7, "tags": ["a", "b"]})).unwrap(),
            Utc::now(),
        );
        let msg = Message::from_envelope(id, 3, env);

        assert_eq!(msg.priority().as_str(), "high");
        assert_eq!(msg.sequence(), 3);
        assert_eq!(
            msg.params_as::<Signup>().unwrap(),
            Signup {
                user_id: 7,
                tags: vec!["a".into(), "b".into()]
            }
        );
    }
}
