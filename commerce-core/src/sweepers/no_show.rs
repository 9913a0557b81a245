//! No-show reservation sweep
//!
//! Daily pass: reservations still PENDING past their pickup date are
//! canceled with stock restored, and the owner's monthly warn count is
//! bumped. Thresholds: 1 → warning only, 2 → 2-day restriction, ≥3 →
//! 5-day restriction. Imposing a restriction additionally cancels all of
//! that user's future PENDING reservations (stock restored) — a cascade
//! beyond the day-of cancellation.
//!
//! The per-reservation body runs under the retry policy: lock contention is
//! retried with backoff, domain failures (already handled concurrently) are
//! counted as skips, and no single failure stops the sweep.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::core::retry::RetryPolicy;
use crate::external::ArtifactStore;
use crate::orders::ReservationService;
use crate::store::{LockKey, MemStore, RowLockManager};
use chrono::Days;
use serde::Serialize;
use shared::models::Actor;
use shared::order::ReservationStatus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 2회 노쇼 제한 일수
const SECOND_WARN_RESTRICT_DAYS: u64 = 2;
/// 3회 이상 노쇼 제한 일수
const THIRD_WARN_RESTRICT_DAYS: u64 = 5;

/// 스위프 실행 집계 (아티팩트로 업로드)
#[derive(Debug, Default, Clone, Serialize)]
pub struct NoShowReport {
    pub date: String,
    pub scanned: usize,
    pub canceled: usize,
    pub skipped: usize,
    pub cascade_canceled: usize,
    pub restricted_users: usize,
    pub errors: usize,
}

pub struct NoShowSweeper {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    reservations: Arc<ReservationService>,
    clock: Arc<dyn Clock>,
    artifacts: Arc<dyn ArtifactStore>,
    retry: RetryPolicy,
    config: CoreConfig,
}

impl NoShowSweeper {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        reservations: Arc<ReservationService>,
        clock: Arc<dyn Clock>,
        artifacts: Arc<dyn ArtifactStore>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            locks,
            reservations,
            clock,
            artifacts,
            retry: RetryPolicy::from_config(&config),
            config,
        }
    }

    /// 주기 루프 — shutdown 신호까지 interval마다 실행
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("No-show sweeper started");
        let interval = std::time::Duration::from_millis(self.config.no_show_sweep_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("No-show sweeper stopped");
                    return;
                }
            }
            let report = self.run_once().await;
            if report.errors > 0 {
                tracing::warn!(errors = report.errors, "No-show sweep finished with errors");
            }
        }
    }

    /// 스위프 1회 실행
    pub async fn run_once(&self) -> NoShowReport {
        let today = self.clock.business_date(self.config.timezone);
        let overdue = self.store.reservations().find_pending_before(today);

        let mut report = NoShowReport {
            date: today.to_string(),
            scanned: overdue.len(),
            ..NoShowReport::default()
        };

        for reservation in overdue {
            let outcome = self
                .retry
                .run("no_show_sweep", || self.handle_no_show(reservation.id))
                .await;
            match outcome {
                Ok(result) => {
                    report.canceled += 1;
                    if result.restricted {
                        report.restricted_users += 1;
                        // 캐스케이드는 건별 잠금을 새로 잡으므로 노쇼 건의
                        // 잠금이 풀린 뒤에 수행한다
                        report.cascade_canceled +=
                            self.cancel_future_pending(result.user_id, today).await;
                    }
                }
                // 동시에 다른 경로가 먼저 처리한 예약 — 정상 스킵
                Err(CoreError::Domain(_)) | Err(CoreError::NotFound { .. }) => {
                    report.skipped += 1;
                }
                Err(e) => {
                    tracing::error!(
                        reservation_id = reservation.id,
                        error = %e,
                        "No-show handling failed terminally"
                    );
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            date = %report.date,
            canceled = report.canceled,
            cascade_canceled = report.cascade_canceled,
            restricted_users = report.restricted_users,
            skipped = report.skipped,
            "No-show sweep finished"
        );

        // 보고서 업로드는 핫패스 밖 — 실패해도 스위프 결과에는 영향 없음
        if let Ok(body) = serde_json::to_value(&report) {
            let key = format!("reports/no-show/{}.json", report.date);
            if let Err(e) = self.artifacts.put_json(&key, body).await {
                tracing::warn!(error = %e, "Failed to upload no-show report");
            }
        }
        report
    }

    /// 노쇼 1건 처리: 취소 + 경고 + (임계 도달 시) 제한과 캐스케이드
    async fn handle_no_show(&self, reservation_id: i64) -> CoreResult<NoShowOutcome> {
        let existing = self.store.reservations().find_by_id(reservation_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Product(existing.product_id),
                LockKey::User(existing.user_id),
                LockKey::Reservation(reservation_id),
            ])
            .await?;

        let today = self.clock.business_date(self.config.timezone);
        // 잠금 획득 후 재검증
        let reservation = self.store.reservations().find_by_id(reservation_id)?;
        if reservation.status != ReservationStatus::Pending || reservation.pickup_date >= today {
            return Err(CoreError::domain("이미 처리된 예약입니다"));
        }

        self.reservations
            .cancel_locked(reservation_id, &Actor::System)?;

        // 당월 경고 횟수 증가 및 제한 부과
        let users = self.store.users();
        let user = users.find_by_id(reservation.user_id)?;
        let warn_count = user.monthly_warn_count + 1;
        let restrict_days = match warn_count {
            1 => 0,
            2 => SECOND_WARN_RESTRICT_DAYS,
            _ => THIRD_WARN_RESTRICT_DAYS,
        };
        let restricted_until = if restrict_days > 0 {
            today.checked_add_days(Days::new(restrict_days))
        } else {
            None
        };
        users.update_with(reservation.user_id, |u| {
            u.monthly_warn_count = warn_count;
            if let Some(until) = restricted_until {
                u.restricted_until = Some(until);
            }
        })?;

        tracing::info!(
            reservation_id,
            user_id = reservation.user_id,
            warn_count,
            restricted_until = ?restricted_until,
            "No-show reservation canceled"
        );

        Ok(NoShowOutcome {
            restricted: restricted_until.is_some(),
            user_id: reservation.user_id,
        })
    }

    /// 제한 캐스케이드 — 사용자의 미래 픽업대기 예약을 건별 잠금으로 취소
    async fn cancel_future_pending(&self, user_id: i64, today: chrono::NaiveDate) -> usize {
        let mut canceled = 0;
        for future in self
            .store
            .reservations()
            .find_pending_by_user_from(user_id, today)
        {
            let guards = self
                .locks
                .lock_many(vec![
                    LockKey::Product(future.product_id),
                    LockKey::Reservation(future.id),
                ])
                .await;
            let Ok(_guards) = guards else {
                tracing::warn!(
                    reservation_id = future.id,
                    "Cascade cancel skipped: lock timeout"
                );
                continue;
            };
            match self.reservations.cancel_locked(future.id, &Actor::System) {
                Ok(_) => canceled += 1,
                // 경합으로 이미 처리된 예약은 건너뛴다
                Err(CoreError::Domain(_)) => {}
                Err(e) => {
                    tracing::warn!(reservation_id = future.id, error = %e, "Cascade cancel failed");
                }
            }
        }
        canceled
    }
}

struct NoShowOutcome {
    restricted: bool,
    user_id: i64,
}
