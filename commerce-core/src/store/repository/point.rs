//! Point Ledger Repository
//!
//! Append-only. Rows are never updated except for the `canceled` flag, which
//! marks a row as compensated so it cannot be canceled twice.

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::PointTransaction;

pub struct PointRepository<'a> {
    store: &'a MemStore,
}

impl<'a> PointRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    pub fn append(&self, tx: PointTransaction) -> PointTransaction {
        self.store.point_txs.write().push(tx.clone());
        tx
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<PointTransaction> {
        self.store
            .point_txs
            .read()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("point transaction", id))
    }

    /// 사용자의 전체 이력 — 최신순
    ///
    /// 원장이 append-only이므로 역순 순회가 곧 생성 시각 내림차순이다.
    pub fn find_by_user(&self, user_id: i64) -> Vec<PointTransaction> {
        self.store
            .point_txs
            .read()
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    /// 특정 참조(주문/클레임)로 생성된 미취소 거래 조회 — 주문 취소 시 보상 대상 탐색
    pub fn find_active_by_reference(
        &self,
        ref_type: shared::models::PointRefType,
        ref_id: i64,
    ) -> Option<PointTransaction> {
        self.store
            .point_txs
            .read()
            .iter()
            .find(|t| {
                t.reference_type == Some(ref_type) && t.reference_id == Some(ref_id) && !t.canceled
            })
            .cloned()
    }

    /// 보상 거래가 상쇄한 원거래에 취소 표시
    pub fn mark_canceled(&self, id: i64) -> RepoResult<()> {
        let mut txs = self.store.point_txs.write();
        let tx = txs
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| RepoError::not_found("point transaction", id))?;
        tx.canceled = true;
        Ok(())
    }
}
