//! 传输（Transport）协议
//!
//! 具名消息的投递机制，本层仅消费两项能力：
//! - `send`：向对端发送具名消息，被接收后即完成；
//! - `on_message`：为某个事件名挂接处理器，消息到达时以 `(事件名, 载荷)` 调用。
//!
//! 处理器以类型擦除的闭包表示，失败以 `anyhow::Error` 原样交给传输自身处理。
//!
use crate::error::TransportError;
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

pub type MessageHandler = Arc<dyn Fn(String, Option<Value>) -> HandlerFuture + Send + Sync>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, event: &str, payload: Option<Value>) -> Result<(), TransportError>;

    fn on_message(&self, event: &str, handler: MessageHandler);
}

/// 将异步闭包包装为 `MessageHandler`
pub fn handler_fn<F, Fut>(f: F) -> MessageHandler
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(move |event, payload| Box::pin(f(event, payload)))
}
