//! 关联事件通道（correlate-channel）
//!
//! 在“发出即忘”的具名消息传输之上提供请求/响应语义：
//! - `channel`：`Correlator` 与 `EventChannel`，负责注册处理器与发送/等待结果；
//! - `middleware`：响应侧中间件，把处理器返回值路由回发送侧的挂起条目；
//! - `payload`：`awaitResult` 约定与关联意图判定；
//! - `transport` / `names`：外部协作者协议，以及内存版实现（`transport_inmemory`）。
//!
//! 挂起结果的存储、结算与容量淘汰由 `correlate-registry` 提供。
//!
pub mod channel;
pub mod error;
pub mod middleware;
pub mod names;
pub mod payload;
pub mod transport;
pub mod transport_inmemory;

pub use channel::{Correlator, Dispatched, EventChannel};
pub use error::{ChannelError, ChannelResult, TransportError};
pub use names::{InMemoryNameRegistry, NameRegistry};
pub use transport::{HandlerFuture, MessageHandler, Transport, handler_fn};
pub use transport_inmemory::{
    Envelope, InMemoryTransport, TransportConfig, TransportHandle, TransportStats,
};

pub use correlate_registry;
