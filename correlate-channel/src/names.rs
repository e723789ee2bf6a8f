//! 已注册事件名集合（NameRegistry）
//!
//! 进程级的“已注册”名称集合，`EventChannel::register` 据此拒绝重复注册，
//! `emit` 据此对未注册的事件名给出警告。
//!
use dashmap::DashSet;
use std::collections::HashSet;

pub trait NameRegistry: Send + Sync {
    fn names(&self) -> HashSet<String>;

    /// 加入名称；已存在时返回 false（检查与插入须为原子操作）
    fn add(&self, name: &str) -> bool;

    fn contains(&self, name: &str) -> bool {
        self.names().contains(name)
    }
}

/// 基于 `DashSet` 的内存实现
#[derive(Debug, Default)]
pub struct InMemoryNameRegistry {
    names: DashSet<String>,
}

impl InMemoryNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameRegistry for InMemoryNameRegistry {
    fn names(&self) -> HashSet<String> {
        self.names.iter().map(|n| n.key().clone()).collect()
    }

    fn add(&self, name: &str) -> bool {
        self.names.insert(name.to_string())
    }

    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}
