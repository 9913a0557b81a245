//! Delivery Order Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::DeliveryOrder;
use shared::order::DeliveryStatus;

pub struct DeliveryRepository<'a> {
    store: &'a MemStore,
}

impl<'a> DeliveryRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    /// Insert a fully-built row; fails on display-code collision.
    pub fn insert(&self, order: DeliveryOrder) -> RepoResult<DeliveryOrder> {
        use dashmap::mapref::entry::Entry;
        match self.store.delivery_codes.entry(order.display_code.clone()) {
            Entry::Occupied(_) => Err(RepoError::DuplicateCode(order.display_code)),
            Entry::Vacant(slot) => {
                slot.insert(order.id);
                self.store.deliveries.insert(order.id, order.clone());
                Ok(order)
            }
        }
    }

    pub fn code_taken(&self, code: &str) -> bool {
        self.store.delivery_codes.contains_key(code)
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<DeliveryOrder> {
        self.store
            .deliveries
            .get(&id)
            .map(|o| o.clone())
            .ok_or_else(|| RepoError::not_found("delivery order", id))
    }

    /// 주문 코드 + 소유자 조합 조회 — 소유자 불일치도 not-found로 취급
    pub fn find_by_code_and_user(&self, code: &str, user_id: i64) -> RepoResult<DeliveryOrder> {
        let id = self
            .store
            .delivery_codes
            .get(code)
            .map(|e| *e.value())
            .ok_or_else(|| RepoError::not_found("delivery order", code))?;
        let order = self.find_by_id(id)?;
        if order.user_id != user_id {
            return Err(RepoError::not_found("delivery order", code));
        }
        Ok(order)
    }

    /// PG 거래가 발급된 채 유예 시간을 넘긴 결제대기 주문 (정산 스위프 대상)
    pub fn find_pending_payment_before(&self, created_before: i64) -> Vec<DeliveryOrder> {
        self.store
            .deliveries
            .iter()
            .filter(|o| {
                o.status == DeliveryStatus::PendingPayment
                    && o.pg_tx_id.is_some()
                    && o.created_at < created_before
            })
            .map(|o| o.clone())
            .collect()
    }

    /// 수락 후 SLA를 넘긴 배달중 주문 (자동완료 스위프 대상)
    pub fn find_out_for_delivery_accepted_before(&self, accepted_before: i64) -> Vec<DeliveryOrder> {
        self.store
            .deliveries
            .iter()
            .filter(|o| {
                o.status == DeliveryStatus::OutForDelivery
                    && o.accepted_at.is_some_and(|at| at < accepted_before)
            })
            .map(|o| o.clone())
            .collect()
    }

    /// Apply a mutation under the caller-held delivery row lock
    pub fn update_with(
        &self,
        id: i64,
        mutate: impl FnOnce(&mut DeliveryOrder),
    ) -> RepoResult<DeliveryOrder> {
        let mut entry = self
            .store
            .deliveries
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("delivery order", id))?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }
}
