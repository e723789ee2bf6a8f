//! 挂起结果注册表（PendingResultRegistry）
//!
//! 关联键 → 进行中的完成句柄 的有界映射，负责：
//! - `create`：分配/接受关联键并登记挂起条目；
//! - `resolve` / `reject`：结算匹配的条目，未知或已结算的键静默忽略；
//! - 清理：每次 `create` / `resolve` / `reject` 都会先清除已结算条目，
//!   再在超出容量时淘汰最旧的一条挂起条目（以 `ResultError::Evicted` 拒绝）。
//!
//! 注册表不设超时；容量淘汰是等待时长的唯一上界。
//! 所有变更（含“查找最旧”扫描）都在同一把锁内完成。
//!
use crate::config::RegistryConfig;
use crate::error::{ResultError, SettleResult};
use crate::key::{CorrelationKey, KeyGenerator, TimestampKeys};
use crate::pending::PendingResult;
use bon::bon;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryState {
    Pending,
    Resolved,
    Rejected,
}

struct PendingEntry<T> {
    completion: Option<oneshot::Sender<SettleResult<T>>>,
    state: EntryState,
    /// 插入序号，淘汰时按此排序
    seq: u64,
    created_at: Instant,
}

impl<T> PendingEntry<T> {
    fn new(completion: oneshot::Sender<SettleResult<T>>, seq: u64) -> Self {
        Self {
            completion: Some(completion),
            state: EntryState::Pending,
            seq,
            created_at: Instant::now(),
        }
    }

    fn is_pending(&self) -> bool {
        self.state == EntryState::Pending
    }

    /// 结算一次；已结算时返回 false 且不产生任何效果
    fn settle(&mut self, outcome: SettleResult<T>) -> bool {
        if !self.is_pending() {
            return false;
        }

        self.state = if outcome.is_ok() {
            EntryState::Resolved
        } else {
            EntryState::Rejected
        };

        if let Some(tx) = self.completion.take() {
            // 等待方已放弃（丢弃了 PendingResult）时发送失败，视为正常
            if tx.send(outcome).is_err() {
                debug!(seq = self.seq, "pending result receiver dropped");
            }
        }

        true
    }
}

struct Entries<T> {
    map: HashMap<CorrelationKey, PendingEntry<T>>,
    next_seq: u64,
}

impl<T> Default for Entries<T> {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            next_seq: 0,
        }
    }
}

/// 注册表统计
#[derive(Debug, Default)]
pub struct RegistryStats {
    pub created: AtomicU64,
    pub resolved: AtomicU64,
    pub rejected: AtomicU64,
    /// 因容量策略被淘汰
    pub evicted: AtomicU64,
    /// 因同一显式键被重复创建而替换
    pub superseded: AtomicU64,
}

/// 有界挂起结果注册表
///
/// 泛型 `T` 为结算值类型，默认为 JSON 值（与线上载荷一致）。
/// 通过 `Arc` 在发送路径与处理器包装路径之间共享。
pub struct PendingResultRegistry<T = Value> {
    entries: Mutex<Entries<T>>,
    config: RegistryConfig,
    keys: Arc<dyn KeyGenerator>,
    stats: RegistryStats,
}

impl<T> Default for PendingResultRegistry<T> {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

// 构建器：`PendingResultRegistry::builder().config(..).key_generator(..).build()`
#[bon]
impl<T> PendingResultRegistry<T> {
    /// 未设置时使用默认配置与时间戳键生成器
    #[builder(start_fn = builder, finish_fn = build)]
    pub fn assemble(
        #[builder(default)] config: RegistryConfig,
        #[builder(default = Arc::new(TimestampKeys::new()) as Arc<dyn KeyGenerator>)]
        key_generator: Arc<dyn KeyGenerator>,
    ) -> Self {
        Self::with_key_generator(config, key_generator)
    }
}

impl<T> PendingResultRegistry<T> {
    /// 使用时间戳键生成器创建
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_key_generator(config, Arc::new(TimestampKeys::new()))
    }

    /// 注入自定义键生成器；`capacity` 为 0 时按 1 处理
    pub fn with_key_generator(config: RegistryConfig, keys: Arc<dyn KeyGenerator>) -> Self {
        let config = RegistryConfig {
            capacity: config.capacity.max(1),
        };

        Self {
            entries: Mutex::new(Entries::default()),
            config,
            keys,
            stats: RegistryStats::default(),
        }
    }

    /// 登记一个挂起条目
    ///
    /// - `key` 为空时由键生成器分配；
    /// - 显式键与仍在挂起的条目重复时，旧条目以 `ResultError::Superseded` 拒绝并被替换；
    /// - 插入后触发一次清理。
    pub fn create(&self, key: Option<CorrelationKey>) -> (CorrelationKey, PendingResult<T>) {
        let key = key.unwrap_or_else(|| self.keys.next_key());
        let (tx, rx) = oneshot::channel();

        let mut entries = self.entries.lock();
        entries.next_seq += 1;
        let seq = entries.next_seq;

        if let Some(mut previous) = entries.map.insert(key.clone(), PendingEntry::new(tx, seq)) {
            let superseded = ResultError::Superseded { key: key.clone() };
            if previous.settle(Err(superseded)) {
                self.stats.superseded.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, previous_seq = previous.seq, "pending result superseded");
            }
        }

        self.stats.created.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, seq, "pending result created");

        self.cleanup(&mut entries);
        drop(entries);

        (key.clone(), PendingResult::new(key, rx))
    }

    /// 以 `value` 完成 `key` 对应的挂起条目
    ///
    /// 先清理；键未知或已结算时静默忽略并返回 false。
    pub fn resolve(&self, key: impl AsRef<str>, value: T) -> bool {
        let key = key.as_ref();
        let settled = self.settle(key, Ok(value));
        if settled {
            self.stats.resolved.fetch_add(1, Ordering::Relaxed);
            debug!(key, "pending result resolved");
        }
        settled
    }

    /// 以 `reason` 拒绝 `key` 对应的挂起条目，约定同 `resolve`
    pub fn reject(&self, key: impl AsRef<str>, reason: impl Into<String>) -> bool {
        let key = key.as_ref();
        let settled = self.settle(key, Err(ResultError::rejected(reason)));
        if settled {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            debug!(key, "pending result rejected");
        }
        settled
    }

    fn settle(&self, key: &str, outcome: SettleResult<T>) -> bool {
        let mut entries = self.entries.lock();
        self.cleanup(&mut entries);

        match entries.map.get_mut(key) {
            Some(entry) => entry.settle(outcome),
            None => {
                debug!(key, "no pending result for key, ignored");
                false
            }
        }
    }

    /// 清理：先清除已结算条目，再在超出容量时淘汰最旧的一条（每次至多一条）
    fn cleanup(&self, entries: &mut Entries<T>) {
        let before = entries.map.len();
        entries.map.retain(|_, entry| entry.is_pending());
        let purged = before - entries.map.len();
        if purged > 0 {
            debug!(purged, "settled pending results purged");
        }

        if entries.map.len() <= self.config.capacity {
            return;
        }

        let oldest = entries
            .map
            .iter()
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            if let Some(mut entry) = entries.map.remove(&key) {
                entry.settle(Err(ResultError::Evicted));
                self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                warn!(
                    key = %key,
                    age_ms = entry.created_at.elapsed().as_millis() as u64,
                    capacity = self.config.capacity,
                    "pending result evicted by capacity policy"
                );
            }
        }
    }

    /// 当前条目数（包含已结算、尚未被清理的条目）
    pub fn len(&self) -> usize {
        self.entries.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// `key` 是否仍在挂起
    pub fn is_pending(&self, key: impl AsRef<str>) -> bool {
        self.entries
            .lock()
            .map
            .get(key.as_ref())
            .is_some_and(PendingEntry::is_pending)
    }

    /// 仍在挂起的键，按创建先后排序（最旧在前）
    pub fn pending_keys(&self) -> Vec<CorrelationKey> {
        let entries = self.entries.lock();
        let mut pending: Vec<(u64, CorrelationKey)> = entries
            .map
            .iter()
            .filter(|(_, entry)| entry.is_pending())
            .map(|(key, entry)| (entry.seq, key.clone()))
            .collect();
        pending.sort_unstable_by_key(|(seq, _)| *seq);
        pending.into_iter().map(|(_, key)| key).collect()
    }

    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::SequentialKeys;
    use serde_json::json;
    use std::future::Future;
    use std::time::Duration;

    fn registry(capacity: usize) -> PendingResultRegistry<Value> {
        PendingResultRegistry::with_key_generator(
            RegistryConfig::builder().capacity(capacity).build(),
            Arc::new(SequentialKeys::with_prefix("k")),
        )
    }

    fn is_ready<T>(pending: &mut PendingResult<T>) -> Option<SettleResult<T>> {
        let waker = std::task::Waker::noop();
        let mut cx = std::task::Context::from_waker(waker);
        match std::pin::Pin::new(pending).poll(&mut cx) {
            std::task::Poll::Ready(out) => Some(out),
            std::task::Poll::Pending => None,
        }
    }

    #[tokio::test]
    async fn create_then_resolve_settles_with_value() {
        let reg = registry(10);
        let (key, pending) = reg.create(None);
        assert_eq!(key.as_str(), "k1");
        assert_eq!(pending.key(), &key);
        assert!(reg.is_pending(&key));

        assert!(reg.resolve(&key, json!({"pong": 1})));
        assert_eq!(pending.await, Ok(json!({"pong": 1})));
        assert!(!reg.is_pending(&key));
    }

    #[tokio::test]
    async fn explicit_key_is_used_verbatim() {
        let reg = registry(10);
        let (key, pending) = reg.create(Some("custom-key".into()));
        assert_eq!(key.as_str(), "custom-key");
        reg.resolve("custom-key", json!("v"));
        assert_eq!(pending.await, Ok(json!("v")));
    }

    #[tokio::test]
    async fn first_settlement_wins() {
        let reg = registry(10);
        let (a, pa) = reg.create(None);
        let (b, pb) = reg.create(None);

        assert!(reg.resolve(&a, json!(1)));
        assert!(!reg.reject(&a, "late"));

        assert!(reg.reject(&b, "boom"));
        assert!(!reg.resolve(&b, json!(2)));

        assert_eq!(pa.await, Ok(json!(1)));
        assert_eq!(pb.await, Err(ResultError::rejected("boom")));
        assert_eq!(reg.stats().resolved.load(Ordering::Relaxed), 1);
        assert_eq!(reg.stats().rejected.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn unknown_key_is_ignored_and_creates_nothing() {
        let reg = registry(10);
        assert!(!reg.resolve("nope", json!(null)));
        assert!(!reg.reject("nope", "why"));
        assert!(reg.is_empty());
    }

    #[test]
    fn settled_entries_linger_until_next_cleanup() {
        let reg = registry(10);
        let (a, _pa) = reg.create(None);
        reg.resolve(&a, json!("done"));
        // 已结算但尚未被清理
        assert_eq!(reg.len(), 1);
        assert!(!reg.is_pending(&a));

        // 下一次 resolve（即便键未知）会触发清理
        reg.resolve("unknown", json!(null));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn settled_entries_are_purged_by_next_reject() {
        let reg = registry(10);
        let (a, _pa) = reg.create(None);
        reg.resolve(&a, json!("done"));
        assert_eq!(reg.len(), 1);

        assert!(!reg.reject("unknown", "no such request"));
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn builder_defaults_and_clamps_capacity() {
        let reg: PendingResultRegistry = PendingResultRegistry::builder().build();
        assert_eq!(reg.capacity(), 10);
        let (key, _p) = reg.create(None);
        assert!(key.as_str().parse::<u64>().is_ok());

        let reg: PendingResultRegistry = PendingResultRegistry::builder()
            .config(RegistryConfig::builder().capacity(0).build())
            .key_generator(Arc::new(SequentialKeys::with_prefix("b")))
            .build();
        assert_eq!(reg.capacity(), 1);
        let (first, _p1) = reg.create(None);
        let (second, _p2) = reg.create(None);
        assert_eq!(first.as_str(), "b1");
        assert_eq!(second.as_str(), "b2");
        assert_eq!(reg.pending_keys(), vec![second]);
    }

    #[test]
    fn settled_entries_are_purged_by_next_create() {
        let reg = registry(10);
        let (a, _pa) = reg.create(None);
        reg.reject(&a, "x");
        assert_eq!(reg.len(), 1);
        let (_b, _pb) = reg.create(None);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn overflow_evicts_only_the_oldest() {
        let reg = registry(3);
        let mut pendings: Vec<_> = (0..4).map(|_| reg.create(None)).collect();

        assert_eq!(reg.len(), 3);
        let (oldest, first) = pendings.remove(0);
        assert_eq!(oldest.as_str(), "k1");
        assert_eq!(first.await, Err(ResultError::Evicted));
        let expected: Vec<CorrelationKey> = vec!["k2".into(), "k3".into(), "k4".into()];
        assert_eq!(reg.pending_keys(), expected);
        for (_, p) in pendings.iter_mut() {
            assert!(is_ready(p).is_none());
        }
        assert_eq!(reg.stats().evicted.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn capacity_two_scenario() {
        let reg = registry(2);
        let (a, pa) = reg.create(Some("A".into()));
        let (b, pb) = reg.create(Some("B".into()));
        let (c, mut pc) = reg.create(Some("C".into()));

        assert_eq!(pa.await, Err(ResultError::Evicted));
        assert!(!reg.is_pending(&a));
        assert!(reg.is_pending(&b));
        assert!(reg.is_pending(&c));

        assert!(reg.resolve(&b, json!("ok")));
        assert_eq!(pb.await, Ok(json!("ok")));
        assert_eq!(reg.len(), 2);

        // 下一次清理清除 B
        reg.resolve("unrelated", json!(null));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.pending_keys(), vec![CorrelationKey::from("C")]);
        assert!(is_ready(&mut pc).is_none());
    }

    #[tokio::test]
    async fn stale_settled_entries_are_purged_before_eviction() {
        let reg = registry(2);
        let (a, _pa) = reg.create(None);
        let (_b, mut pb) = reg.create(None);
        reg.resolve(&a, json!(1));

        // A 已结算：清理先清除 A，B/C 未超容量，B 不被淘汰
        let (_c, mut pc) = reg.create(None);
        assert_eq!(reg.len(), 2);
        assert!(is_ready(&mut pb).is_none());
        assert!(is_ready(&mut pc).is_none());
        assert_eq!(reg.stats().evicted.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn duplicate_explicit_key_supersedes_previous() {
        let reg = registry(10);
        let (_, first) = reg.create(Some("dup".into()));
        let (_, second) = reg.create(Some("dup".into()));

        assert_eq!(
            first.await,
            Err(ResultError::Superseded { key: "dup".into() })
        );
        assert_eq!(reg.len(), 1);
        reg.resolve("dup", json!(2));
        assert_eq!(second.await, Ok(json!(2)));
        assert_eq!(reg.stats().superseded.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn dropping_registry_abandons_pending_results() {
        let reg = registry(10);
        let (_, pending) = reg.create(None);
        drop(reg);
        assert_eq!(pending.await, Err(ResultError::Abandoned));
    }

    #[test]
    fn dropped_receiver_still_counts_as_settled() {
        let reg = registry(10);
        let (key, pending) = reg.create(None);
        drop(pending);
        assert!(reg.resolve(&key, json!(1)));
        assert!(!reg.resolve(&key, json!(2)));
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let reg = registry(0);
        assert_eq!(reg.capacity(), 1);
        let (_a, _pa) = reg.create(None);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_stay_bounded() {
        let reg = Arc::new(registry(10));
        let mut set = tokio::task::JoinSet::new();

        for i in 0..100 {
            let reg = reg.clone();
            set.spawn(async move {
                let (key, pending) = reg.create(None);
                if i % 2 == 0 {
                    reg.resolve(&key, json!(i));
                }
                tokio::time::timeout(Duration::from_millis(50), pending).await
            });
        }

        while let Some(joined) = set.join_next().await {
            let _ = joined.unwrap();
            assert!(reg.len() <= reg.capacity());
        }
        assert!(reg.len() <= reg.capacity());
        assert_eq!(reg.stats().created.load(Ordering::Relaxed), 100);
    }
}
