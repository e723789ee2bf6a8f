//! 关联键（CorrelationKey）与键生成器（KeyGenerator）
//!
//! - `CorrelationKey`：连接一次“等待结果”的请求与其响应的字符串标识；
//! - `KeyGenerator`：未显式提供键时由注册表调用，作为依赖注入，便于测试确定性；
//! - 内置实现：`SequentialKeys`（单调计数）、`TimestampKeys`（毫秒时间戳，严格递增）、
//!   `UuidKeys`（需开启 `uuid` 特性，适合跨进程共享键空间）。
//!
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// 关联键
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// 从线上载荷的 `awaitResult` 字段还原关联键
    ///
    /// 字符串原样使用，数字按十进制字符串处理（两端保持一致的强制转换）；
    /// 整数值的浮点数（如 `1.0`）按整数写出，其它类型不构成关联键。
    pub fn from_wire(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(number_key(n))),
            _ => None,
        }
    }
}

/// 浮点数在安全整数范围内且无小数部分时按整数书写
fn number_key(n: &serde_json::Number) -> String {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
            (f as i64).to_string()
        }
        _ => n.to_string(),
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CorrelationKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CorrelationKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<CorrelationKey> for Value {
    fn from(key: CorrelationKey) -> Self {
        Value::String(key.0)
    }
}

impl AsRef<str> for CorrelationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CorrelationKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// 关联键生成器
///
/// 在注册表生命周期内，对同一生成器的连续调用不得产生重复键。
pub trait KeyGenerator: Send + Sync {
    fn next_key(&self) -> CorrelationKey;
}

/// 单调计数键：`{prefix}{n}`，n 从 1 开始
#[derive(Debug, Default)]
pub struct SequentialKeys {
    prefix: String,
    next: AtomicU64,
}

impl SequentialKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl KeyGenerator for SequentialKeys {
    fn next_key(&self) -> CorrelationKey {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        CorrelationKey(format!("{}{n}", self.prefix))
    }
}

/// 毫秒时间戳键
///
/// 同一毫秒内的多次调用会顺延到 `last + 1`，保证严格递增、互不冲突。
#[derive(Debug, Default)]
pub struct TimestampKeys {
    last: AtomicU64,
}

impl TimestampKeys {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default()
    }
}

impl KeyGenerator for TimestampKeys {
    fn next_key(&self) -> CorrelationKey {
        let now = Self::now_millis();
        let prev = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        CorrelationKey(now.max(prev + 1).to_string())
    }
}

/// UUID v4 键
#[cfg(feature = "uuid")]
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidKeys;

#[cfg(feature = "uuid")]
impl KeyGenerator for UuidKeys {
    fn next_key(&self) -> CorrelationKey {
        CorrelationKey(uuid::Uuid::new_v4().to_string())
    }
}
