//! 挂起结果注册表（correlate-registry）
//!
//! 将“发出即忘”的具名消息通道升级为请求/响应机制时所需的核心状态：
//! - 关联键（`key`）：显式传入或由注入的 `KeyGenerator` 生成；
//! - 挂起条目与完成句柄（`registry` / `pending`）：每个条目恰好结算一次；
//! - 有界容量（`config`）：超出时淘汰最旧的挂起条目，避免响应永不到达时内存无限增长；
//! - 失败原因（`error`）：淘汰、显式拒绝、替换与放弃。
//!
//! 本 crate 与传输实现解耦，仅依赖 tokio 的 oneshot 作为完成句柄。
//!
//! 典型用法：
//! ```rust
//! use correlate_registry::{PendingResultRegistry, RegistryConfig};
//! use serde_json::json;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let registry = PendingResultRegistry::new(RegistryConfig::builder().capacity(2).build());
//! let (key, pending) = registry.create(None);
//! registry.resolve(&key, json!("pong"));
//! assert_eq!(pending.await, Ok(json!("pong")));
//! # });
//! ```
//!
pub mod config;
pub mod error;
pub mod key;
pub mod pending;
pub mod registry;

pub use config::{DEFAULT_CAPACITY, RegistryConfig};
pub use error::{EVICTED_REASON, ResultError, SettleResult};
pub use key::{CorrelationKey, KeyGenerator, SequentialKeys, TimestampKeys};
#[cfg(feature = "uuid")]
pub use key::UuidKeys;
pub use pending::PendingResult;
pub use registry::{PendingResultRegistry, RegistryStats};
