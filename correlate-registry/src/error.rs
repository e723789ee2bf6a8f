//! 挂起结果的失败原因
//!
//! 注册表自身从不向调用方同步报错；所有失败都通过挂起结果（`PendingResult`）
//! 以 `ResultError` 异步拒绝的形式体现，等待方将其视为可恢复的普通失败。
//!
use crate::key::CorrelationKey;
use thiserror::Error;

/// 容量策略淘汰时使用的固定原因
pub const EVICTED_REASON: &str = "evicted by capacity policy";

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultError {
    /// 超出容量时最旧的挂起条目被强制拒绝
    #[error("evicted by capacity policy")]
    Evicted,

    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// 同一显式键被再次创建，旧条目被替换
    #[error("superseded by a newer request with key={key}")]
    Superseded { key: CorrelationKey },

    /// 完成句柄在结算前被丢弃（例如注册表已销毁）
    #[error("pending result abandoned before settlement")]
    Abandoned,
}

impl ResultError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_evicted(&self) -> bool {
        matches!(self, Self::Evicted)
    }
}

/// 挂起结果的 Result 别名
pub type SettleResult<T> = Result<T, ResultError>;
