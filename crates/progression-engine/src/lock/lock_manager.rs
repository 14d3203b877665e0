//! 键控锁管理器
//!
//! 基于 DashMap + tokio Mutex 实现按键串行化，获取超时返回 `LockConflict`。

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Deserialize;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

use crate::error::{ProgressionError, Result};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

/// 锁配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// 获取锁的最长等待时间（毫秒）
    pub acquire_timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_ms: 5_000,
        }
    }
}

impl LockConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

/// 键控锁管理器
///
/// 克隆开销很小，所有克隆共享同一张锁表。
#[derive(Clone)]
pub struct LockManager {
    locks: Arc<LockTable>,
    config: LockConfig,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    /// 使用默认配置创建锁管理器
    pub fn with_defaults() -> Self {
        Self::new(LockConfig::default())
    }

    /// 获取锁
    ///
    /// 在 `acquire_timeout` 内无法获取时返回 `LockConflict` 错误。
    #[instrument(skip(self))]
    pub async fn acquire(&self, key: &str) -> Result<LockGuard> {
        let mutex = self.slot(key);

        match tokio::time::timeout(self.config.acquire_timeout(), mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "Lock acquired");
                Ok(LockGuard::new(key.to_string(), guard, self.locks.clone()))
            }
            Err(_) => {
                warn!(
                    key = %key,
                    timeout_ms = self.config.acquire_timeout_ms,
                    "获取锁超时"
                );
                // 等待期间持有的引用已释放，回收可能空闲的条目
                release_slot(&self.locks, key);
                Err(ProgressionError::LockConflict {
                    resource: key.to_string(),
                })
            }
        }
    }

    /// 尝试获取锁，不等待
    ///
    /// 如果锁不可用立即返回 None。
    pub fn try_acquire(&self, key: &str) -> Option<LockGuard> {
        let mutex = self.slot(key);
        match mutex.try_lock_owned() {
            Ok(guard) => Some(LockGuard::new(key.to_string(), guard, self.locks.clone())),
            Err(_) => {
                release_slot(&self.locks, key);
                None
            }
        }
    }

    /// 在锁保护下执行一个完整的多步操作
    ///
    /// 临界区运行在独立的 tokio 任务中：调用方的 future 被取消时，
    /// 已开始的操作仍会完整执行并释放锁，不会留下半完成的状态。
    pub async fn run_exclusive<F, T>(&self, key: String, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let _guard = manager.acquire(&key).await?;
            operation.await
        });

        handle
            .await
            .map_err(|e| ProgressionError::Internal(format!("临界区任务异常终止: {}", e)))?
    }

    /// 当前锁表中的条目数（持有中或等待中的键）
    pub fn active_keys(&self) -> usize {
        self.locks.len()
    }

    fn slot(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// 锁守卫
///
/// drop 时释放锁；若没有其他任务持有或等待同一键，同时回收锁表条目。
pub struct LockGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockTable>,
}

impl LockGuard {
    fn new(key: String, guard: OwnedMutexGuard<()>, locks: Arc<LockTable>) -> Self {
        Self {
            key,
            guard: Some(guard),
            locks,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 显式释放锁
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // 先释放互斥量（其持有的 Arc 引用随之释放），再判断是否可回收
        self.guard.take();
        release_slot(&self.locks, &self.key);
        debug!(key = %self.key, "Lock released");
    }
}

/// 表中的 Arc 是唯一引用时移除条目
///
/// 判断与移除在同一分片写锁内完成，获取方克隆 Arc 也需要该分片锁，因此不会误删。
fn release_slot(locks: &LockTable, key: &str) {
    locks.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_config() -> LockConfig {
        LockConfig {
            acquire_timeout_ms: 50,
        }
    }

    #[tokio::test]
    async fn test_acquire_and_release_cleans_up() {
        let manager = LockManager::new(fast_config());
        let guard = manager.acquire("user:1").await.unwrap();
        assert_eq!(guard.key(), "user:1");
        assert_eq!(manager.active_keys(), 1);

        guard.release();
        assert_eq!(manager.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_acquire_times_out_with_lock_conflict() {
        let manager = LockManager::new(fast_config());
        let _held = manager.acquire("user:1").await.unwrap();

        let err = manager.acquire("user:1").await.err().unwrap();
        assert!(matches!(err, ProgressionError::LockConflict { ref resource } if resource == "user:1"));
        // 持有者仍在，条目不应被回收
        assert_eq!(manager.active_keys(), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let manager = LockManager::new(fast_config());
        let _a = manager.acquire("user:1").await.unwrap();
        let b = manager.acquire("user:2").await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_try_acquire() {
        let manager = LockManager::new(fast_config());
        let held = manager.try_acquire("badge:1:a");
        assert!(held.is_some());
        assert!(manager.try_acquire("badge:1:a").is_none());
        drop(held);
        assert!(manager.try_acquire("badge:1:a").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_run_exclusive_serializes_same_key() {
        let manager = LockManager::with_defaults();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                manager
                    .run_exclusive("user:shared".to_string(), async move {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        inside.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(manager.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_run_exclusive_completes_when_caller_is_cancelled() {
        let manager = LockManager::with_defaults();
        let done = Arc::new(AtomicUsize::new(0));

        let flag = done.clone();
        let call = manager.run_exclusive("user:1".to_string(), async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            flag.store(1, Ordering::SeqCst);
            Ok(())
        });
        // 调用方在临界区完成前放弃等待
        let _ = tokio::time::timeout(Duration::from_millis(1), call).await;

        // 再次获取同一把锁会等待前一个临界区结束
        let _guard = manager.acquire("user:1").await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
