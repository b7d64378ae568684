// ==========================================
// 新品工单表单配置 - 读穿透缓存
// ==========================================
// 职责: 缓存"当前激活配置"与"配置列表"读取结果
// 策略: TTL 过期 + 容量上限（淘汰最早写入项）
// 红线: 每次写入后由 API 层整体失效，不允许读到已提交写之前的旧值
// ==========================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone)]
struct CacheEntry<V> {
    value: V,
    created_at: Instant,
}

/// 读穿透缓存
///
/// ttl 为 0 时缓存关闭，每次读取都直接走加载函数。
pub struct ReadThroughCache<V: Clone> {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    generation: AtomicU64, // 每次 invalidate_all 递增
}

impl<V: Clone> ReadThroughCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries: max_entries.max(1),
            entries: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// 读取缓存，未命中时调用 `load` 并写入
    ///
    /// 加载期间不持有缓存锁；加载失败不写入缓存。
    /// 加载期间发生过失效时，结果只返回给调用方，不写入缓存。
    pub fn get_or_populate<E, F>(&self, key: &str, load: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if !self.is_enabled() {
            return load();
        }

        if let Some(hit) = self.get(key) {
            tracing::trace!("cache hit: key={}", key);
            return Ok(hit);
        }

        let generation = self.generation.load(Ordering::Acquire);
        let value = load()?;
        self.insert_if_current(key.to_string(), value.clone(), generation);
        Ok(value)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.entries.lock().ok()?;
        let ttl = self.ttl;
        entries.retain(|_, v| v.created_at.elapsed() <= ttl);
        entries.get(key).map(|e| e.value.clone())
    }

    pub fn insert(&self, key: String, value: V) {
        let generation = self.generation.load(Ordering::Acquire);
        self.insert_if_current(key, value, generation);
    }

    fn insert_if_current(&self, key: String, value: V, generation: u64) {
        if !self.is_enabled() {
            return;
        }
        let Ok(mut entries) = self.entries.lock() else {
            tracing::warn!("cache lock poisoned, skip insert: key={}", key);
            return;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            tracing::trace!("cache invalidated during load, skip insert: key={}", key);
            return;
        }
        let ttl = self.ttl;
        entries.retain(|_, v| v.created_at.elapsed() <= ttl);
        if entries.len() >= self.max_entries && !entries.contains_key(&key) {
            if let Some(victim) = entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&victim);
            }
        }
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
            },
        );
    }

    /// 整体失效
    pub fn invalidate_all(&self) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.generation.fetch_add(1, Ordering::AcqRel);
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
