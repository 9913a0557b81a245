//! Monthly warn-count reset
//!
//! Zeroes every user's monthly no-show warn counter on the 1st of each
//! month (business timezone). Restrictions already imposed keep their end
//! date — only the counter resets.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::CoreResult;
use crate::store::{LockKey, MemStore, RowLockManager};
use chrono::Datelike;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 월초 여부 확인 주기
const CHECK_INTERVAL_MS: u64 = 3_600_000;

pub struct WarnResetSweeper {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
    /// 마지막으로 리셋한 (년, 월) — 같은 달 중복 실행 방지
    last_reset: Mutex<Option<(i32, u32)>>,
}

impl WarnResetSweeper {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            locks,
            clock,
            config,
            last_reset: Mutex::new(None),
        }
    }

    /// 주기 루프 — 매월 1일에 1회 실행
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Warn-reset sweeper started");
        let interval = std::time::Duration::from_millis(CHECK_INTERVAL_MS);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Warn-reset sweeper stopped");
                    return;
                }
            }
            let today = self.clock.business_date(self.config.timezone);
            if today.day() != 1 {
                continue;
            }
            let month = (today.year(), today.month());
            if *self.last_reset.lock() == Some(month) {
                continue;
            }
            match self.run_once().await {
                Ok(count) => {
                    *self.last_reset.lock() = Some(month);
                    tracing::info!(users = count, "Monthly warn counts reset");
                }
                Err(e) => tracing::error!(error = %e, "Warn reset failed"),
            }
        }
    }

    /// 전체 사용자 경고 횟수 초기화 — 리셋된 사용자 수 반환
    pub async fn run_once(&self) -> CoreResult<usize> {
        let users = self.store.users();
        let mut reset = 0;
        for user_id in users.all_ids() {
            let _guard = self.locks.lock(LockKey::User(user_id)).await?;
            users.update_with(user_id, |u| u.monthly_warn_count = 0)?;
            reset += 1;
        }
        Ok(reset)
    }
}
