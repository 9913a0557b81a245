//! Stock Reservation Engine
//!
//! The only code allowed to write `Product.stock`. Both operations run the
//! whole read-validate-write sequence under the product's exclusive row lock
//! (pessimistic — no optimistic retry inside the call; callers may retry on
//! lock timeout).
//!
//! Idempotency against double-restore is the caller's responsibility: the
//! order's own status guard is the barrier, there is no per-order stock
//! mutation ledger.

use crate::core::error::{CoreError, CoreResult};
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::Product;
use std::sync::Arc;

pub struct StockEngine {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
}

impl StockEngine {
    pub fn new(store: Arc<MemStore>, locks: Arc<RowLockManager>) -> Self {
        Self { store, locks }
    }

    /// 재고 차감 — 단독 호출용 (상품 잠금을 직접 획득)
    pub async fn reserve(&self, product_id: i64, quantity: i64) -> CoreResult<Product> {
        let _guard = self.locks.lock(LockKey::Product(product_id)).await?;
        self.reserve_locked(product_id, quantity)
    }

    /// 재고 차감 — 호출자가 이미 상품 행 잠금을 보유한 경우
    ///
    /// 주문 생성처럼 여러 행을 한 번에 잠그는 명령 경로에서 사용한다.
    pub fn reserve_locked(&self, product_id: i64, quantity: i64) -> CoreResult<Product> {
        if quantity <= 0 {
            return Err(CoreError::validation("수량은 1 이상이어야 합니다"));
        }

        let products = self.store.products();
        let product = products.find_by_id(product_id)?;

        if !product.is_orderable() {
            return Err(CoreError::domain("판매 중인 상품이 아닙니다"));
        }

        // stock == None 은 무제한 재고: 수량 검증을 건너뛴다
        if let Some(stock) = product.stock {
            if stock < quantity {
                return Err(CoreError::StockExceeded {
                    product_id,
                    requested: quantity,
                    available: stock,
                });
            }
        }

        let updated = products.update_with(product_id, |p| {
            if let Some(stock) = p.stock.as_mut() {
                *stock -= quantity;
            }
            p.total_sold += quantity;
        })?;

        tracing::debug!(
            product_id,
            quantity,
            remaining = ?updated.stock,
            "Stock reserved"
        );
        Ok(updated)
    }

    /// 재고 복원 — 단독 호출용
    pub async fn restore(&self, product_id: i64, quantity: i64) -> CoreResult<Product> {
        let _guard = self.locks.lock(LockKey::Product(product_id)).await?;
        self.restore_locked(product_id, quantity)
    }

    /// 재고 복원 — 호출자가 이미 상품 행 잠금을 보유한 경우
    ///
    /// 상한 검사 없이 무조건 더한다. 카탈로그상의 정원과 현재 재고를 따로
    /// 추적하지 않는 설계이므로, 중복 복원 방지는 주문 상태 가드의 몫이다.
    pub fn restore_locked(&self, product_id: i64, quantity: i64) -> CoreResult<Product> {
        if quantity <= 0 {
            return Err(CoreError::validation("수량은 1 이상이어야 합니다"));
        }

        let products = self.store.products();
        // soft-deleted 상품도 복원 대상 — 취소는 언제나 유효해야 한다
        products.find_by_id(product_id)?;

        let updated = products.update_with(product_id, |p| {
            if let Some(stock) = p.stock.as_mut() {
                *stock += quantity;
            }
        })?;

        tracing::debug!(
            product_id,
            quantity,
            stock = ?updated.stock,
            "Stock restored"
        );
        Ok(updated)
    }
}
