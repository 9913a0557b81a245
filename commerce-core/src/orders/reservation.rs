//! Reservation service (매장 픽업 예약)
//!
//! Creation holds stock immediately; cancel restores it. Every status
//! mutation runs under the reservation's row lock (plus the product row lock
//! when stock moves) with the current state re-validated after acquisition.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::orders::display_code;
use crate::orders::events::{DomainEvent, EventBus};
use crate::orders::lifecycle::reservation_table;
use crate::stock::StockEngine;
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::{Actor, Reservation, ReservationCreate};
use shared::order::{ReservationEvent, ReservationStatus};
use shared::util::snowflake_id;
use std::sync::Arc;

pub struct ReservationService {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    stock: Arc<StockEngine>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    config: CoreConfig,
}

impl ReservationService {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        stock: Arc<StockEngine>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            locks,
            stock,
            clock,
            events,
            config,
        }
    }

    /// 예약 생성 — 재고를 즉시 점유한다
    pub async fn reserve(&self, input: ReservationCreate) -> CoreResult<Reservation> {
        if input.quantity <= 0 {
            return Err(CoreError::validation("수량은 1 이상이어야 합니다"));
        }
        let today = self.clock.business_date(self.config.timezone);
        if input.pickup_date < today {
            return Err(CoreError::validation("픽업일은 지난 날짜일 수 없습니다"));
        }

        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Product(input.product_id),
                LockKey::User(input.user_id),
            ])
            .await?;

        // 제한 사용자 차단
        let user = self.store.users().find_by_id(input.user_id)?;
        if user.is_restricted(today) {
            return Err(CoreError::domain(format!(
                "주문이 제한된 사용자입니다 ({}까지)",
                user.restricted_until.unwrap_or(today)
            )));
        }

        let product = self.stock.reserve_locked(input.product_id, input.quantity)?;

        let repo = self.store.reservations();
        let code = display_code::generate_unique(
            'R',
            today,
            self.config.display_code_max_attempts,
            |c| repo.code_taken(c),
        )?;

        let reservation = Reservation {
            id: snowflake_id(),
            user_id: input.user_id,
            product_id: input.product_id,
            display_code: code,
            status: ReservationStatus::Pending,
            quantity: input.quantity,
            amount: product.price * input.quantity,
            pickup_date: input.pickup_date,
            created_at: self.clock.now_millis(),
            picked_at: None,
            canceled_at: None,
        };

        let inserted = match repo.insert(reservation) {
            Ok(r) => r,
            Err(e) => {
                // 코드 인덱스 경합 등으로 삽입이 실패하면 점유한 재고를 되돌린다
                self.stock.restore_locked(input.product_id, input.quantity)?;
                return Err(e.into());
            }
        };

        tracing::info!(
            reservation_id = inserted.id,
            user_id = inserted.user_id,
            product_id = inserted.product_id,
            quantity = inserted.quantity,
            code = %inserted.display_code,
            "Reservation created"
        );
        self.events.publish(DomainEvent::ReservationCreated {
            reservation_id: inserted.id,
            user_id: inserted.user_id,
            product_id: inserted.product_id,
            quantity: inserted.quantity,
        });
        Ok(inserted)
    }

    /// 예약 취소 — 재고 복원 동반
    ///
    /// 사용자 본인 취소는 소유권 불일치를 not-found로 처리한다.
    pub async fn cancel(&self, reservation_id: i64, actor: &Actor) -> CoreResult<Reservation> {
        let existing = self.store.reservations().find_by_id(reservation_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Reservation(reservation_id),
                LockKey::Product(existing.product_id),
            ])
            .await?;

        let updated = self.cancel_locked(reservation_id, actor)?;
        self.events.publish(DomainEvent::ReservationCanceled {
            reservation_id: updated.id,
            restored_quantity: updated.quantity,
        });
        Ok(updated)
    }

    /// 취소 본체 — 호출자가 예약·상품 행 잠금을 보유한 경우 (노쇼 스위프 공용)
    pub(crate) fn cancel_locked(
        &self,
        reservation_id: i64,
        actor: &Actor,
    ) -> CoreResult<Reservation> {
        let repo = self.store.reservations();
        // 잠금 획득 후 재검증
        let reservation = repo.find_by_id(reservation_id)?;
        if let Actor::User(uid) = actor {
            if reservation.user_id != *uid {
                return Err(CoreError::not_found("reservation", reservation_id));
            }
        }

        let next = reservation_table().apply(reservation.status, ReservationEvent::Cancel)?;
        self.stock
            .restore_locked(reservation.product_id, reservation.quantity)?;

        let now = self.clock.now_millis();
        let updated = repo.update_with(reservation_id, |r| {
            r.status = next;
            r.canceled_at = Some(now);
        })?;
        tracing::info!(
            reservation_id,
            actor = ?actor,
            restored = updated.quantity,
            "Reservation canceled"
        );
        Ok(updated)
    }

    /// 매장 픽업 처리 (당일 수령)
    pub async fn pick_up(&self, reservation_id: i64) -> CoreResult<Reservation> {
        let _guard = self.locks.lock(LockKey::Reservation(reservation_id)).await?;

        let repo = self.store.reservations();
        let reservation = repo.find_by_id(reservation_id)?;
        let next = reservation_table().apply(reservation.status, ReservationEvent::Pick)?;

        let now = self.clock.now_millis();
        let updated = repo.update_with(reservation_id, |r| {
            r.status = next;
            r.picked_at = Some(now);
        })?;
        self.events.publish(DomainEvent::ReservationPicked {
            reservation_id: updated.id,
        });
        Ok(updated)
    }

    /// 수량 부분 축소 — 줄어든 만큼 재고를 비례 복원
    ///
    /// 결과 수량이 1 미만이 되는 요청은 거부한다 (전체 취소를 써야 한다).
    pub async fn reduce_quantity(
        &self,
        reservation_id: i64,
        by: i64,
        actor: &Actor,
    ) -> CoreResult<Reservation> {
        if by <= 0 {
            return Err(CoreError::validation("차감 수량은 1 이상이어야 합니다"));
        }

        let existing = self.store.reservations().find_by_id(reservation_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Reservation(reservation_id),
                LockKey::Product(existing.product_id),
            ])
            .await?;

        let repo = self.store.reservations();
        let reservation = repo.find_by_id(reservation_id)?;
        if let Actor::User(uid) = actor {
            if reservation.user_id != *uid {
                return Err(CoreError::not_found("reservation", reservation_id));
            }
        }
        if reservation.status != ReservationStatus::Pending {
            return Err(CoreError::domain("수량 변경은 픽업대기 상태에서만 가능합니다"));
        }

        let new_quantity = reservation.quantity - by;
        if new_quantity < 1 {
            return Err(CoreError::domain(
                "수량은 1개 미만으로 줄일 수 없습니다. 전체 취소를 이용해주세요",
            ));
        }

        // amount = 단가 × 수량이므로 단가는 나누어 떨어진다
        let unit_price = reservation.amount / reservation.quantity;
        self.stock.restore_locked(reservation.product_id, by)?;

        let updated = repo.update_with(reservation_id, |r| {
            r.quantity = new_quantity;
            r.amount = unit_price * new_quantity;
        })?;
        tracing::info!(
            reservation_id,
            reduced_by = by,
            remaining = new_quantity,
            "Reservation quantity reduced"
        );
        Ok(updated)
    }
}
