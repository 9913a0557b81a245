//! Point Ledger
//!
//! Append-only transaction log driving the user's denormalized balance.
//! Every mutation appends exactly one immutable row with the post-mutation
//! `balance_after` snapshot, then updates `User.point_balance` in the same
//! locked unit of work — the balance is always recomputable from the ledger.
//!
//! Invariant: balance never goes negative. `cancel_earn` fails instead of
//! violating it; `cancel_use` can only add, so it always succeeds.

use crate::core::clock::Clock;
use crate::core::error::{CoreError, CoreResult};
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::{Actor, PointRefType, PointTransaction, PointTxType};
use shared::util::snowflake_id;
use std::sync::Arc;

/// 최근 이력 조회 건수 상한
const RECENT_LIMIT: usize = 5;

/// 일괄 지급 대상
#[derive(Debug, Clone)]
pub enum BulkEarnTarget {
    /// 전체 사용자
    All,
    /// 명시적 사용자 목록 (빈 목록은 거부)
    Users(Vec<i64>),
}

pub struct PointService {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    clock: Arc<dyn Clock>,
}

impl PointService {
    pub fn new(store: Arc<MemStore>, locks: Arc<RowLockManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            locks,
            clock,
        }
    }

    // ========================================================================
    // Earn / Use
    // ========================================================================

    /// 포인트 적립
    pub async fn earn(
        &self,
        user_id: i64,
        amount: i64,
        tx_type: PointTxType,
        reason: &str,
        reference_type: Option<PointRefType>,
        reference_id: Option<i64>,
        actor: Actor,
    ) -> CoreResult<PointTransaction> {
        let _guard = self.locks.lock(LockKey::User(user_id)).await?;
        self.earn_locked(user_id, amount, tx_type, reason, reference_type, reference_id, actor)
    }

    /// 포인트 적립 — 호출자가 사용자 행 잠금을 보유한 경우
    pub fn earn_locked(
        &self,
        user_id: i64,
        amount: i64,
        tx_type: PointTxType,
        reason: &str,
        reference_type: Option<PointRefType>,
        reference_id: Option<i64>,
        actor: Actor,
    ) -> CoreResult<PointTransaction> {
        if !tx_type.is_earn() {
            return Err(CoreError::validation("적립 거래 유형이 아닙니다"));
        }
        if amount <= 0 {
            return Err(CoreError::validation("포인트 금액은 0보다 커야 합니다"));
        }
        self.append_locked(user_id, tx_type, amount, reason, reference_type, reference_id, actor)
    }

    /// 포인트 사용
    pub async fn use_points(
        &self,
        user_id: i64,
        amount: i64,
        reason: &str,
        reference_type: Option<PointRefType>,
        reference_id: Option<i64>,
        actor: Actor,
    ) -> CoreResult<PointTransaction> {
        let _guard = self.locks.lock(LockKey::User(user_id)).await?;
        self.use_points_locked(user_id, amount, reason, reference_type, reference_id, actor)
    }

    /// 포인트 사용 — 호출자가 사용자 행 잠금을 보유한 경우
    pub fn use_points_locked(
        &self,
        user_id: i64,
        amount: i64,
        reason: &str,
        reference_type: Option<PointRefType>,
        reference_id: Option<i64>,
        actor: Actor,
    ) -> CoreResult<PointTransaction> {
        if amount <= 0 {
            return Err(CoreError::validation("포인트 금액은 0보다 커야 합니다"));
        }
        let balance = self.balance(user_id)?;
        if amount > balance {
            return Err(CoreError::InsufficientPoints {
                requested: amount,
                balance,
            });
        }
        self.append_locked(
            user_id,
            PointTxType::UsePurchase,
            -amount,
            reason,
            reference_type,
            reference_id,
            actor,
        )
    }

    // ========================================================================
    // Compensating cancels
    // ========================================================================

    /// 적립 취소 — EARN_* 거래만 대상, 잔액 부족 시 실패
    ///
    /// 적립 후 그만큼을 이미 써버렸다면 취소가 불가능하다 (잔액 음수 방지).
    pub async fn cancel_earn(&self, tx_id: i64, actor: Actor) -> CoreResult<PointTransaction> {
        let original = self.store.points().find_by_id(tx_id)?;
        if !original.tx_type.is_earn() {
            return Err(CoreError::validation("적립 거래만 취소할 수 있습니다"));
        }

        let _guard = self.locks.lock(LockKey::User(original.user_id)).await?;

        // 잠금 획득 후 재검증 — 동시 취소가 먼저 끝났을 수 있다
        let original = self.store.points().find_by_id(tx_id)?;
        if original.canceled {
            return Err(CoreError::domain("이미 취소된 거래입니다"));
        }

        let balance = self.balance(original.user_id)?;
        if original.amount > balance {
            return Err(CoreError::InsufficientPoints {
                requested: original.amount,
                balance,
            });
        }

        let compensation = self.append_locked(
            original.user_id,
            PointTxType::CancelEarn,
            -original.amount,
            &format!("적립 취소 (원거래 {tx_id})"),
            original.reference_type,
            original.reference_id,
            actor,
        )?;
        self.store.points().mark_canceled(tx_id)?;
        Ok(compensation)
    }

    /// 사용 취소 — USE_* 거래만 대상, 항상 성공 (잔액이 늘어나는 방향)
    pub async fn cancel_use(&self, tx_id: i64) -> CoreResult<PointTransaction> {
        let original = self.store.points().find_by_id(tx_id)?;
        let _guard = self.locks.lock(LockKey::User(original.user_id)).await?;
        self.cancel_use_locked(tx_id)
    }

    /// 사용 취소 — 호출자가 사용자 행 잠금을 보유한 경우 (주문 취소 경로)
    pub fn cancel_use_locked(&self, tx_id: i64) -> CoreResult<PointTransaction> {
        let original = self.store.points().find_by_id(tx_id)?;
        if !original.tx_type.is_use() {
            return Err(CoreError::validation("사용 거래만 취소할 수 있습니다"));
        }
        if original.canceled {
            return Err(CoreError::domain("이미 취소된 거래입니다"));
        }

        let compensation = self.append_locked(
            original.user_id,
            PointTxType::CancelUse,
            original.amount.abs(),
            &format!("사용 취소 (원거래 {tx_id})"),
            original.reference_type,
            original.reference_id,
            Actor::System,
        )?;
        self.store.points().mark_canceled(tx_id)?;
        Ok(compensation)
    }

    // ========================================================================
    // Bulk grant
    // ========================================================================

    /// 일괄 지급 — 개별 실패는 집계만 하고 배치를 중단하지 않는다
    pub async fn bulk_earn(
        &self,
        target: BulkEarnTarget,
        amount: i64,
        reason: &str,
        actor: Actor,
    ) -> CoreResult<(usize, usize)> {
        let user_ids = match target {
            BulkEarnTarget::All => self.store.users().all_ids(),
            BulkEarnTarget::Users(ids) => {
                if ids.is_empty() {
                    return Err(CoreError::validation("지급 대상이 비어 있습니다"));
                }
                ids
            }
        };

        let mut success = 0usize;
        let mut failure = 0usize;
        for user_id in user_ids {
            match self
                .earn(
                    user_id,
                    amount,
                    PointTxType::EarnPromotion,
                    reason,
                    None,
                    None,
                    actor.clone(),
                )
                .await
            {
                Ok(_) => success += 1,
                Err(e) => {
                    tracing::warn!(user_id, error = %e, "Bulk earn failed for user");
                    failure += 1;
                }
            }
        }
        Ok((success, failure))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// 현재 잔액 (비정규화 필드)
    pub fn balance(&self, user_id: i64) -> CoreResult<i64> {
        Ok(self.store.users().find_by_id(user_id)?.point_balance)
    }

    /// 전체 이력 — 최신순
    pub fn history(&self, user_id: i64) -> Vec<PointTransaction> {
        self.store.points().find_by_user(user_id)
    }

    /// 최근 이력 — 고정 상한 (5건)
    pub fn recent(&self, user_id: i64) -> Vec<PointTransaction> {
        let mut rows = self.store.points().find_by_user(user_id);
        rows.truncate(RECENT_LIMIT);
        rows
    }

    // ========================================================================
    // Internal
    // ========================================================================

    /// 원장 한 줄 추가 + 비정규화 잔액 갱신 (사용자 잠금 하에서)
    fn append_locked(
        &self,
        user_id: i64,
        tx_type: PointTxType,
        signed_amount: i64,
        reason: &str,
        reference_type: Option<PointRefType>,
        reference_id: Option<i64>,
        actor: Actor,
    ) -> CoreResult<PointTransaction> {
        let users = self.store.users();
        let user = users.find_by_id(user_id)?;
        let balance_after = user.point_balance + signed_amount;
        debug_assert!(balance_after >= 0, "callers guard non-negative balance");

        let tx = PointTransaction {
            id: snowflake_id(),
            user_id,
            tx_type,
            amount: signed_amount,
            balance_after,
            reason: reason.to_string(),
            reference_type,
            reference_id,
            canceled: false,
            actor,
            created_at: self.clock.now_millis(),
        };
        self.store.points().append(tx.clone());
        users.update_with(user_id, |u| u.point_balance = balance_after)?;

        tracing::debug!(
            user_id,
            tx_type = ?tx.tx_type,
            amount = signed_amount,
            balance_after,
            "Point transaction appended"
        );
        Ok(tx)
    }
}
