//! Courier Order Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::{CourierOrder, CourierOrderItem};
use shared::order::CourierStatus;

pub struct CourierRepository<'a> {
    store: &'a MemStore,
}

impl<'a> CourierRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    /// Insert a fully-built order with its line items; fails on display-code
    /// collision.
    pub fn insert(
        &self,
        order: CourierOrder,
        items: Vec<CourierOrderItem>,
    ) -> RepoResult<CourierOrder> {
        use dashmap::mapref::entry::Entry;
        match self.store.courier_codes.entry(order.display_code.clone()) {
            Entry::Occupied(_) => Err(RepoError::DuplicateCode(order.display_code)),
            Entry::Vacant(slot) => {
                slot.insert(order.id);
                self.store.couriers.insert(order.id, order.clone());
                for item in items {
                    self.store.courier_items.insert(item.id, item);
                }
                Ok(order)
            }
        }
    }

    pub fn code_taken(&self, code: &str) -> bool {
        self.store.courier_codes.contains_key(code)
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<CourierOrder> {
        self.store
            .couriers
            .get(&id)
            .map(|o| o.clone())
            .ok_or_else(|| RepoError::not_found("courier order", id))
    }

    pub fn find_by_code(&self, code: &str) -> RepoResult<CourierOrder> {
        let id = self
            .store
            .courier_codes
            .get(code)
            .map(|e| *e.value())
            .ok_or_else(|| RepoError::not_found("courier order", code))?;
        self.find_by_id(id)
    }

    /// 주문 코드 + 소유자 조합 조회 — 소유자 불일치도 not-found로 취급
    pub fn find_by_code_and_user(&self, code: &str, user_id: i64) -> RepoResult<CourierOrder> {
        let order = self.find_by_code(code)?;
        if order.user_id != user_id {
            return Err(RepoError::not_found("courier order", code));
        }
        Ok(order)
    }

    /// PG 거래가 발급된 채 유예 시간을 넘긴 결제대기 주문 (정산 스위프 대상)
    pub fn find_pending_payment_before(&self, created_before: i64) -> Vec<CourierOrder> {
        self.store
            .couriers
            .iter()
            .filter(|o| {
                o.status == CourierStatus::PendingPayment
                    && o.pg_tx_id.is_some()
                    && o.created_at < created_before
            })
            .map(|o| o.clone())
            .collect()
    }

    /// 주문의 라인 아이템 목록
    pub fn items_of(&self, order_id: i64) -> Vec<CourierOrderItem> {
        let mut items: Vec<CourierOrderItem> = self
            .store
            .courier_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .map(|i| i.clone())
            .collect();
        items.sort_by_key(|i| i.id);
        items
    }

    pub fn find_item(&self, item_id: i64) -> RepoResult<CourierOrderItem> {
        self.store
            .courier_items
            .get(&item_id)
            .map(|i| i.clone())
            .ok_or_else(|| RepoError::not_found("order item", item_id))
    }

    /// Apply a mutation under the caller-held courier row lock
    pub fn update_with(
        &self,
        id: i64,
        mutate: impl FnOnce(&mut CourierOrder),
    ) -> RepoResult<CourierOrder> {
        let mut entry = self
            .store
            .couriers
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("courier order", id))?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }

    /// Item rows are guarded by their parent order's lock.
    pub fn update_item_with(
        &self,
        item_id: i64,
        mutate: impl FnOnce(&mut CourierOrderItem),
    ) -> RepoResult<CourierOrderItem> {
        let mut entry = self
            .store
            .courier_items
            .get_mut(&item_id)
            .ok_or_else(|| RepoError::not_found("order item", item_id))?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }
}
