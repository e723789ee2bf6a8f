//! 注册表配置
//!
use bon::Builder;

/// 默认容量：同时挂起的关联请求上限
pub const DEFAULT_CAPACITY: usize = 10;

/// 挂起结果注册表配置
#[derive(Builder, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    /// 最多保留的条目数；超出时每次清理淘汰最旧的一条
    #[builder(default = DEFAULT_CAPACITY)]
    pub capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}
