//! Delivery order service (근거리 직접 배달)
//!
//! A delivery order bundles the user's PENDING pickup reservations for home
//! delivery. Paying flips the linked reservations to PICKED through the
//! cascade handler, inside the same unit of work; canceling flips them back.
//! Stock never moves here — the reservations own it.
//!
//! External calls (PG ready/refund) happen after all validation and before
//! any local mutation, so a gateway failure leaves nothing to roll back.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::orders::cascade::ReservationCascade;
use crate::orders::display_code;
use crate::orders::events::{DomainEvent, EventBus};
use crate::orders::lifecycle::delivery_table;
use crate::payment::PaymentGateway;
use crate::points::PointService;
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::{Actor, DeliveryOrder, DeliveryOrderCreate, PointRefType};
use shared::order::{DeliveryEvent, DeliveryStatus, ReservationStatus};
use shared::util::snowflake_id;
use std::sync::Arc;

pub struct DeliveryService {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    points: Arc<PointService>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    config: CoreConfig,
}

impl DeliveryService {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        points: Arc<PointService>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            locks,
            points,
            gateway,
            clock,
            events,
            config,
        }
    }

    fn order_lock_keys(order: &DeliveryOrder) -> Vec<LockKey> {
        let mut keys = vec![LockKey::Delivery(order.id), LockKey::User(order.user_id)];
        keys.extend(order.reservation_ids.iter().map(|&id| LockKey::Reservation(id)));
        keys
    }

    /// 배달 주문 생성 (결제 준비)
    ///
    /// PG 결제분이 있으면 PG 거래를 발급받아 결제대기로 두고, 전액 포인트
    /// 결제면 PG를 거치지 않고 즉시 결제완료로 전환한다.
    pub async fn ready(&self, input: DeliveryOrderCreate) -> CoreResult<DeliveryOrder> {
        if input.reservation_ids.is_empty() {
            return Err(CoreError::validation("배달할 예약을 선택해야 합니다"));
        }
        if input.delivery_fee < 0 || input.point_to_use < 0 {
            return Err(CoreError::validation("금액은 음수일 수 없습니다"));
        }

        let mut keys = vec![LockKey::User(input.user_id)];
        keys.extend(input.reservation_ids.iter().map(|&id| LockKey::Reservation(id)));
        let _guards = self.locks.lock_many(keys).await?;

        let today = self.clock.business_date(self.config.timezone);
        let user = self.store.users().find_by_id(input.user_id)?;
        if user.is_restricted(today) {
            return Err(CoreError::domain(format!(
                "주문이 제한된 사용자입니다 ({}까지)",
                user.restricted_until.unwrap_or(today)
            )));
        }

        // 연결 예약 검증: 본인 소유 + 픽업대기 상태
        let reservations = self.store.reservations();
        let mut goods_amount = 0i64;
        for &rid in &input.reservation_ids {
            let reservation = reservations.find_by_id(rid)?;
            if reservation.user_id != input.user_id {
                return Err(CoreError::not_found("reservation", rid));
            }
            if reservation.status != ReservationStatus::Pending {
                return Err(CoreError::domain(format!(
                    "배달 묶음에는 픽업대기 예약만 담을 수 있습니다 (예약 {} 상태: {})",
                    reservation.display_code,
                    reservation.status.label()
                )));
            }
            goods_amount += reservation.amount;
        }

        let total_amount = goods_amount + input.delivery_fee;
        if input.point_to_use > total_amount {
            return Err(CoreError::validation("포인트 사용액이 주문 금액을 초과합니다"));
        }
        let balance = self.points.balance(input.user_id)?;
        if input.point_to_use > balance {
            return Err(CoreError::InsufficientPoints {
                requested: input.point_to_use,
                balance,
            });
        }

        let repo = self.store.deliveries();
        let code = display_code::generate_unique(
            'D',
            today,
            self.config.display_code_max_attempts,
            |c| repo.code_taken(c),
        )?;

        let pg_payment_amount = total_amount - input.point_to_use;
        // 외부 호출은 로컬 변경 전에 — 실패 시 되돌릴 것이 없다
        let pg_tx_id = if pg_payment_amount > 0 {
            Some(self.gateway.ready(&code, pg_payment_amount).await?.transaction_id)
        } else {
            None
        };

        let order_id = snowflake_id();
        if input.point_to_use > 0 {
            self.points.use_points_locked(
                input.user_id,
                input.point_to_use,
                "배달 주문 결제",
                Some(PointRefType::DeliveryOrder),
                Some(order_id),
                Actor::User(input.user_id),
            )?;
        }

        let now = self.clock.now_millis();
        let order = DeliveryOrder {
            id: order_id,
            user_id: input.user_id,
            display_code: code,
            status: DeliveryStatus::PendingPayment,
            total_amount,
            point_used: input.point_to_use,
            pg_payment_amount,
            pg_tx_id,
            pg_approval_id: None,
            reservation_ids: input.reservation_ids.clone(),
            created_at: now,
            paid_at: None,
            accepted_at: None,
            delivered_at: None,
            canceled_at: None,
        };
        let mut inserted = repo.insert(order)?;

        // 전액 포인트 결제는 PG 콜백이 올 일이 없다 — 즉시 결제완료 처리
        if pg_payment_amount == 0 {
            inserted = self.mark_paid_locked(inserted.id, None)?;
        }

        tracing::info!(
            order_id = inserted.id,
            code = %inserted.display_code,
            total = inserted.total_amount,
            point_used = inserted.point_used,
            status = ?inserted.status,
            "Delivery order ready"
        );
        Ok(inserted)
    }

    /// 결제 확정 (콜백/정산 스위프 공용 전이)
    ///
    /// PENDING_PAYMENT → PAID 가드가 구조적 멱등성을 보장한다: 중복 웹훅은
    /// 두 번째 호출에서 도메인 오류로 끝나고 어떤 부수효과도 반복되지 않는다.
    pub async fn confirm_payment(
        &self,
        order_id: i64,
        approval_id: Option<&str>,
    ) -> CoreResult<DeliveryOrder> {
        let existing = self.store.deliveries().find_by_id(order_id)?;
        let _guards = self.locks.lock_many(Self::order_lock_keys(&existing)).await?;
        let updated = self.mark_paid_locked(order_id, approval_id)?;
        Ok(updated)
    }

    /// 결제 전이 본체 — 호출자가 주문·예약 잠금을 보유
    fn mark_paid_locked(
        &self,
        order_id: i64,
        approval_id: Option<&str>,
    ) -> CoreResult<DeliveryOrder> {
        let repo = self.store.deliveries();
        let order = repo.find_by_id(order_id)?;
        let next = delivery_table().apply(order.status, DeliveryEvent::Pay)?;

        let now = self.clock.now_millis();
        let approval = approval_id.map(str::to_string);
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.paid_at = Some(now);
            if approval.is_some() {
                o.pg_approval_id = approval.clone();
            }
        })?;

        // 같은 단위 작업 안에서 연결 예약을 PICKED로 전환
        let cascade = ReservationCascade::new(&self.store, self.clock.as_ref());
        let flipped = cascade.on_delivery_paid(&updated.reservation_ids)?;

        tracing::info!(
            order_id,
            flipped_reservations = flipped,
            "Delivery order paid"
        );
        self.events.publish(DomainEvent::DeliveryPaid {
            order_id,
            reservation_ids: updated.reservation_ids.clone(),
        });
        Ok(updated)
    }

    /// 기사 수락 — 자동완료 SLA의 기준 시각을 남긴다
    pub async fn accept(&self, order_id: i64) -> CoreResult<DeliveryOrder> {
        let _guard = self.locks.lock(LockKey::Delivery(order_id)).await?;
        let repo = self.store.deliveries();
        let order = repo.find_by_id(order_id)?;
        let next = delivery_table().apply(order.status, DeliveryEvent::Accept)?;
        let now = self.clock.now_millis();
        repo.update_with(order_id, |o| {
            o.status = next;
            o.accepted_at = Some(now);
        })
        .map_err(Into::into)
    }

    /// 배달 완료 처리 (수동 또는 자동완료 스위프)
    pub async fn mark_delivered(&self, order_id: i64) -> CoreResult<DeliveryOrder> {
        let _guard = self.locks.lock(LockKey::Delivery(order_id)).await?;
        let repo = self.store.deliveries();
        let order = repo.find_by_id(order_id)?;
        let next = delivery_table().apply(order.status, DeliveryEvent::Deliver)?;
        let now = self.clock.now_millis();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.delivered_at = Some(now);
        })?;
        self.events.publish(DomainEvent::DeliveryDelivered { order_id });
        Ok(updated)
    }

    /// 주문 취소 — 포인트 복원, PG 결제분 환불, 연결 예약 복귀
    ///
    /// 전액 포인트 결제 주문은 PG 환불 호출 자체를 건너뛴다.
    pub async fn cancel(&self, order_id: i64, actor: &Actor) -> CoreResult<DeliveryOrder> {
        let existing = self.store.deliveries().find_by_id(order_id)?;
        let _guards = self.locks.lock_many(Self::order_lock_keys(&existing)).await?;

        let repo = self.store.deliveries();
        let order = repo.find_by_id(order_id)?;
        if let Actor::User(uid) = actor {
            if order.user_id != *uid {
                return Err(CoreError::not_found("delivery order", order_id));
            }
        }

        let previous = order.status;
        let next = delivery_table().apply(order.status, DeliveryEvent::Cancel)?;

        // 검증 완료 후, 로컬 변경 전에 PG 환불 (결제 완료분에 한함)
        if previous == DeliveryStatus::Paid && order.pg_payment_amount > 0 {
            let tx_id = order
                .pg_tx_id
                .as_deref()
                .ok_or_else(|| CoreError::domain("PG 거래 정보가 없는 주문입니다"))?;
            self.gateway
                .cancel(tx_id, order.pg_payment_amount, "주문 취소")
                .await?;
        }

        // 포인트 홀드 복원
        if order.point_used > 0 {
            if let Some(hold) = self
                .store
                .points()
                .find_active_by_reference(PointRefType::DeliveryOrder, order_id)
            {
                self.points.cancel_use_locked(hold.id)?;
            }
        }

        let now = self.clock.now_millis();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.canceled_at = Some(now);
        })?;

        // PICKED로 넘어갔던 예약을 PENDING으로 복귀
        let cascade = ReservationCascade::new(&self.store, self.clock.as_ref());
        let reverted = cascade.on_delivery_reverted(&updated.reservation_ids)?;

        tracing::info!(
            order_id,
            previous = ?previous,
            reverted_reservations = reverted,
            refunded = updated.pg_payment_amount,
            "Delivery order canceled"
        );
        self.events.publish(DomainEvent::DeliveryCanceled {
            order_id,
            reservation_ids: updated.reservation_ids.clone(),
        });
        Ok(updated)
    }

    /// 결제 실패 처리 (정산 스위프) — 포인트 홀드만 되돌린다
    ///
    /// 예약은 결제 전이라 한 번도 전환된 적이 없으므로 건드리지 않는다.
    pub async fn fail_payment(&self, order_id: i64) -> CoreResult<DeliveryOrder> {
        let existing = self.store.deliveries().find_by_id(order_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Delivery(order_id),
                LockKey::User(existing.user_id),
            ])
            .await?;

        let repo = self.store.deliveries();
        let order = repo.find_by_id(order_id)?;
        let next = delivery_table().apply(order.status, DeliveryEvent::Fail)?;

        if order.point_used > 0 {
            if let Some(hold) = self
                .store
                .points()
                .find_active_by_reference(PointRefType::DeliveryOrder, order_id)
            {
                self.points.cancel_use_locked(hold.id)?;
            }
        }

        let now = self.clock.now_millis();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.canceled_at = Some(now);
        })?;
        tracing::info!(order_id, "Delivery order failed");
        self.events.publish(DomainEvent::DeliveryFailed { order_id });
        Ok(updated)
    }
}
