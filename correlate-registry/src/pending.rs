//! 挂起结果（PendingResult）
//!
//! 生产方持有的只读完成句柄：作为 `Future` 等待注册表中对应条目被结算。
//! 条目在结算前被丢弃（注册表销毁）时以 `ResultError::Abandoned` 结束。
//!
use crate::error::{ResultError, SettleResult};
use crate::key::CorrelationKey;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

#[derive(Debug)]
#[must_use = "a pending result does nothing unless awaited"]
pub struct PendingResult<T> {
    key: CorrelationKey,
    rx: oneshot::Receiver<SettleResult<T>>,
}

impl<T> PendingResult<T> {
    pub(crate) fn new(key: CorrelationKey, rx: oneshot::Receiver<SettleResult<T>>) -> Self {
        Self { key, rx }
    }

    /// 该结果对应的关联键
    pub fn key(&self) -> &CorrelationKey {
        &self.key
    }
}

impl<T> Future for PendingResult<T> {
    type Output = SettleResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ResultError::Abandoned)))
    }
}
