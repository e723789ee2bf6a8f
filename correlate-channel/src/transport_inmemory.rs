//! 内存版传输（InMemoryTransport）
//!
//! 进程内回环实现，满足 `Transport` 协议：
//! - `send`：将 `Envelope { event, data }` 放入无界队列，入队即视为被接收；
//! - `start`：启动分发循环，按事件名将消息路由到已挂接的处理器并发执行；
//! - 处理器失败由传输自身记录（`tracing::error!` 与计数），不会回传给发送方。
//!
//! 典型用途：测试环境、示例与单进程内的请求/响应。
//! 注意：`start` 之前发送的消息会在队列中等待，启动后依序分发。

use crate::error::TransportError;
use crate::transport::{MessageHandler, Transport};
use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

/// 线上信封：事件名 + 载荷
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    pub data: Option<Value>,
}

/// 传输配置
#[derive(Clone, Copy, Debug)]
pub struct TransportConfig {
    /// 单条消息的处理并发（同一事件名挂接了多个处理器时）
    pub handler_concurrency: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            handler_concurrency: 8,
        }
    }
}

#[derive(Debug, Default)]
pub struct TransportStats {
    pub sent: AtomicU64,
    pub handled: AtomicU64,
    pub failed: AtomicU64,
}

pub struct InMemoryTransport {
    tx: mpsc::UnboundedSender<Envelope>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    listeners: Arc<DashMap<String, Vec<MessageHandler>>>,
    stats: Arc<TransportStats>,
    config: TransportConfig,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl InMemoryTransport {
    pub fn new(config: TransportConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            listeners: Arc::new(DashMap::new()),
            stats: Arc::new(TransportStats::default()),
            config,
        }
    }

    /// 启动分发循环，返回可用于关闭/等待的句柄；只能启动一次
    pub fn start(&self) -> Result<TransportHandle, TransportError> {
        let mut rx = self
            .rx
            .lock()
            .take()
            .ok_or(TransportError::AlreadyStarted)?;

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();

        let listeners = self.listeners.clone();
        let stats = self.stats.clone();
        let concurrency = self.config.handler_concurrency.max(1);
        let loop_token = token.clone();
        let loop_tracker = tracker.clone();

        tracker.spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_token.cancelled() => break,
                    maybe_envelope = rx.recv() => {
                        let Some(envelope) = maybe_envelope else { break };
                        let handlers = listeners
                            .get(&envelope.event)
                            .map(|h| h.value().clone())
                            .unwrap_or_default();
                        if handlers.is_empty() {
                            debug!(event = %envelope.event, "no listener for event, dropped");
                            continue;
                        }
                        // 每条消息独立任务处理，处理器内部可再次经由本传输往返而不阻塞分发
                        loop_tracker.spawn(Self::deliver(envelope, handlers, concurrency, stats.clone()));
                    }
                }
            }
        });

        Ok(TransportHandle { token, tracker })
    }

    async fn deliver(
        envelope: Envelope,
        handlers: Vec<MessageHandler>,
        concurrency: usize,
        stats: Arc<TransportStats>,
    ) {
        let Envelope { event, data } = envelope;

        stream::iter(handlers)
            .for_each_concurrent(Some(concurrency), |h| {
                let event = event.clone();
                let data = data.clone();
                let stats = stats.clone();
                async move {
                    match (h)(event.clone(), data).await {
                        Ok(_) => {
                            stats.handled.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                            error!(event = %event, error = %err, "message handler failed");
                        }
                    }
                }
            })
            .await;
    }

    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, event: &str, payload: Option<Value>) -> Result<(), TransportError> {
        let envelope = Envelope {
            event: event.to_string(),
            data: payload,
        };
        self.tx.send(envelope).map_err(|_| TransportError::Closed)?;
        self.stats.sent.fetch_add(1, Ordering::Relaxed);
        debug!(event, "message enqueued");
        Ok(())
    }

    fn on_message(&self, event: &str, handler: MessageHandler) {
        self.listeners
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }
}

/// 传输运行句柄：用于优雅关闭与等待在途处理结束
pub struct TransportHandle {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl TransportHandle {
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub async fn join(self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl Drop for TransportHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
