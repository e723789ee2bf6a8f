//! 载荷约定（payload）
//!
//! 线上载荷为任意 JSON 值；当其为对象且含 `awaitResult` 字段时表示请求关联结果：
//! - 字段为字符串：显式关联键，原样透传；
//! - 字段为其它任意值（布尔、数字、null 等）：请求由注册表生成键；
//! - 发送前该字段被改写为实际分配的键。
//!
//! 关联意图在发送时一次性判定为 `Correlation`，之后不再做运行时类型分支。
//!
use correlate_registry::CorrelationKey;
use serde_json::Value;

/// 载荷中的关联字段名
pub const AWAIT_RESULT: &str = "awaitResult";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Correlation {
    /// 发出即忘
    None,
    /// 请求关联结果；`Some` 为显式键
    Requested(Option<CorrelationKey>),
}

impl Correlation {
    pub fn of(payload: Option<&Value>) -> Self {
        match payload.and_then(|p| p.get(AWAIT_RESULT)) {
            None => Correlation::None,
            Some(Value::String(key)) => Correlation::Requested(Some(key.as_str().into())),
            Some(_) => Correlation::Requested(None),
        }
    }
}

/// 将 `awaitResult` 改写为已分配的键；非对象载荷保持不变
pub fn stamp(payload: &mut Value, key: &CorrelationKey) {
    if let Some(fields) = payload.as_object_mut() {
        fields.insert(AWAIT_RESULT.to_string(), key.clone().into());
    }
}

/// 响应侧：从入站载荷中取出关联键
pub fn inbound_key(payload: Option<&Value>) -> Option<CorrelationKey> {
    payload
        .and_then(|p| p.get(AWAIT_RESULT))
        .and_then(CorrelationKey::from_wire)
}
