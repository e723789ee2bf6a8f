//! 事件通道（EventChannel）
//!
//! `Correlator` 持有三项共享协作者：挂起结果注册表、传输与已注册名称集合，
//! 在进程启动时显式构造，并以 `Arc` 同时供发送路径与处理器包装路径使用。
//! `EventChannel` 表示一个具名事件：
//! - `register`：挂接处理器（经响应侧中间件包装），重复注册报错；
//! - `dispatch`：按需登记挂起条目、改写载荷并发送，返回可等待的句柄；
//! - `emit`：`dispatch` 后若请求了结果则等待其结算。
//!
use crate::error::{ChannelError, ChannelResult};
use crate::middleware::route_results;
use crate::names::{InMemoryNameRegistry, NameRegistry};
use crate::payload::{self, Correlation};
use crate::transport::{MessageHandler, Transport};
use bon::Builder;
use correlate_registry::{CorrelationKey, PendingResult, PendingResultRegistry};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// 发送结果
#[derive(Debug)]
#[must_use]
pub enum Dispatched {
    /// 未请求结果，传输已接收
    Delivered,
    /// 已登记挂起条目，等待对端结算
    Awaiting(PendingResult<Value>),
}

impl Dispatched {
    pub fn key(&self) -> Option<&CorrelationKey> {
        match self {
            Dispatched::Delivered => None,
            Dispatched::Awaiting(pending) => Some(pending.key()),
        }
    }
}

#[derive(Builder, Clone)]
pub struct Correlator {
    transport: Arc<dyn Transport>,
    #[builder(default = Arc::new(PendingResultRegistry::default()))]
    registry: Arc<PendingResultRegistry>,
    #[builder(default = Arc::new(InMemoryNameRegistry::new()) as Arc<dyn NameRegistry>)]
    names: Arc<dyn NameRegistry>,
}

impl Correlator {
    pub fn channel(&self, name: impl Into<String>) -> EventChannel {
        EventChannel {
            name: name.into(),
            ctx: self.clone(),
        }
    }

    /// 等价于 `self.channel(name).register(handler)`
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: MessageHandler,
    ) -> ChannelResult<EventChannel> {
        let channel = self.channel(name);
        channel.register(handler)?;
        Ok(channel)
    }

    /// 等价于 `self.channel(name).emit(payload)`
    pub async fn emit(
        &self,
        name: impl Into<String>,
        payload: Option<Value>,
    ) -> ChannelResult<Option<Value>> {
        self.channel(name).emit(payload).await
    }

    pub fn registry(&self) -> &Arc<PendingResultRegistry> {
        &self.registry
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn names(&self) -> &Arc<dyn NameRegistry> {
        &self.names
    }
}

#[derive(Clone)]
pub struct EventChannel {
    name: String,
    ctx: Correlator,
}

impl EventChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 事件名是否已在进程级集合中注册
    pub fn exists(&self) -> bool {
        self.ctx.names.contains(&self.name)
    }

    /// 注册处理器
    ///
    /// 名称已存在时返回 `ChannelError::AlreadyRegistered`，已有注册不受影响。
    pub fn register(&self, handler: MessageHandler) -> ChannelResult<&Self> {
        if !self.ctx.names.add(&self.name) {
            return Err(ChannelError::AlreadyRegistered {
                name: self.name.clone(),
            });
        }

        self.ctx
            .transport
            .on_message(&self.name, route_results(self.ctx.registry.clone(), handler));
        debug!(event = %self.name, "event registered");

        Ok(self)
    }

    /// 发送载荷，不等待结果
    ///
    /// 载荷请求结果时，先在注册表登记挂起条目并将 `awaitResult` 改写为分配的键，
    /// 再交给传输发送；发送失败时该条目被拒绝，错误返回给调用方。
    pub async fn dispatch(&self, payload: Option<Value>) -> ChannelResult<Dispatched> {
        if !self.exists() {
            warn!(event = %self.name, "event is not registered, emitting anyway");
        }

        let mut payload = payload;
        let pending = match Correlation::of(payload.as_ref()) {
            Correlation::None => None,
            Correlation::Requested(key) => {
                let (key, pending) = self.ctx.registry.create(key);
                if let Some(p) = payload.as_mut() {
                    payload::stamp(p, &key);
                }
                Some(pending)
            }
        };

        if let Err(err) = self.ctx.transport.send(&self.name, payload).await {
            if let Some(pending) = &pending {
                self.ctx.registry.reject(pending.key(), err.to_string());
            }
            return Err(err.into());
        }

        Ok(match pending {
            Some(pending) => Dispatched::Awaiting(pending),
            None => Dispatched::Delivered,
        })
    }

    /// 发送载荷；请求了结果时等待结算并返回 `Some(value)`，否则返回 `None`
    ///
    /// 挂起条目被容量策略淘汰时返回 `ChannelError::Result(ResultError::Evicted)`。
    pub async fn emit(&self, payload: Option<Value>) -> ChannelResult<Option<Value>> {
        match self.dispatch(payload).await? {
            Dispatched::Delivered => Ok(None),
            Dispatched::Awaiting(pending) => Ok(Some(pending.await?)),
        }
    }
}
