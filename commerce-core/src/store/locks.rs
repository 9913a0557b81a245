//! Per-row pessimistic locks
//!
//! Every stock or status mutation happens while holding the exclusive lock
//! of the row(s) involved, for the whole read-validate-write sequence.
//! Acquisition is bounded: exceeding the configured timeout surfaces as
//! `CoreError::LockTimeout`, the retryable concurrency class.

use crate::core::error::{CoreError, CoreResult};
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// 잠금 키 — (테이블, 행 ID)
///
/// Variant order defines the global acquisition order used by `lock_many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Product(i64),
    User(i64),
    Reservation(i64),
    Delivery(i64),
    Courier(i64),
    Claim(i64),
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKey::Product(id) => write!(f, "product:{id}"),
            LockKey::User(id) => write!(f, "user:{id}"),
            LockKey::Reservation(id) => write!(f, "reservation:{id}"),
            LockKey::Delivery(id) => write!(f, "delivery:{id}"),
            LockKey::Courier(id) => write!(f, "courier:{id}"),
            LockKey::Claim(id) => write!(f, "claim:{id}"),
        }
    }
}

/// 행 잠금 관리자 — 키별 비동기 뮤텍스
pub struct RowLockManager {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl RowLockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    fn entry(&self, key: LockKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// 단일 행 잠금 획득 (타임아웃 시 LockTimeout)
    pub async fn lock(&self, key: LockKey) -> CoreResult<OwnedMutexGuard<()>> {
        let mutex = self.entry(key);
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => Err(CoreError::LockTimeout(key.to_string())),
        }
    }

    /// 여러 행 잠금 — 정렬·중복 제거 후 전역 순서대로 획득
    pub async fn lock_many(&self, mut keys: Vec<LockKey>) -> CoreResult<Vec<OwnedMutexGuard<()>>> {
        keys.sort_unstable();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock(key).await?);
        }
        Ok(guards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(timeout_ms: u64) -> RowLockManager {
        RowLockManager::new(Duration::from_millis(timeout_ms))
    }

    #[tokio::test]
    async fn contended_lock_times_out_with_retryable_error() {
        let locks = manager(50);
        let _held = locks.lock(LockKey::Product(1)).await.unwrap();
        let err = locks.lock(LockKey::Product(1)).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("product:1"));
    }

    #[tokio::test]
    async fn released_lock_can_be_reacquired() {
        let locks = manager(50);
        drop(locks.lock(LockKey::User(7)).await.unwrap());
        assert!(locks.lock(LockKey::User(7)).await.is_ok());
    }

    #[tokio::test]
    async fn lock_many_dedups_and_orders_keys() {
        let locks = manager(50);
        let guards = locks
            .lock_many(vec![
                LockKey::Reservation(3),
                LockKey::Product(1),
                LockKey::Product(1),
                LockKey::User(2),
            ])
            .await
            .unwrap();
        assert_eq!(guards.len(), 3);
    }
}
