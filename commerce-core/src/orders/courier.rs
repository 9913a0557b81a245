//! Courier order service (택배 배송 주문)
//!
//! Standalone purchases shipped by parcel courier. Line items snapshot the
//! catalog name/price at order time; stock is reserved per line at creation
//! and restored exactly once on cancel/fail — the order's own status guard
//! is the double-restore barrier.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::orders::display_code;
use crate::orders::events::{DomainEvent, EventBus};
use crate::orders::lifecycle::courier_table;
use crate::payment::PaymentGateway;
use crate::points::PointService;
use crate::stock::StockEngine;
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::{
    Actor, CourierOrder, CourierOrderCreate, CourierOrderItem, PointRefType,
};
use shared::order::{CourierEvent, CourierStatus, ItemStatus};
use shared::util::snowflake_id;
use std::sync::Arc;

pub struct CourierService {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    stock: Arc<StockEngine>,
    points: Arc<PointService>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
    config: CoreConfig,
}

impl CourierService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        stock: Arc<StockEngine>,
        points: Arc<PointService>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            locks,
            stock,
            points,
            gateway,
            clock,
            events,
            config,
        }
    }

    /// 취소/실패 경로에서 잠가야 하는 행 전체
    fn cancel_lock_keys(&self, order: &CourierOrder) -> Vec<LockKey> {
        let mut keys = vec![LockKey::Courier(order.id), LockKey::User(order.user_id)];
        keys.extend(
            self.store
                .couriers()
                .items_of(order.id)
                .iter()
                .map(|i| LockKey::Product(i.product_id)),
        );
        keys
    }

    /// 주문 생성 (결제 준비) — 라인별 재고를 즉시 점유
    pub async fn ready(&self, input: CourierOrderCreate) -> CoreResult<CourierOrder> {
        if input.lines.is_empty() {
            return Err(CoreError::validation("주문할 상품을 선택해야 합니다"));
        }
        if input.lines.iter().any(|l| l.quantity <= 0) {
            return Err(CoreError::validation("수량은 1 이상이어야 합니다"));
        }
        if input.shipping_fee < 0 || input.point_to_use < 0 {
            return Err(CoreError::validation("금액은 음수일 수 없습니다"));
        }

        let mut keys = vec![LockKey::User(input.user_id)];
        keys.extend(input.lines.iter().map(|l| LockKey::Product(l.product_id)));
        let _guards = self.locks.lock_many(keys).await?;

        let today = self.clock.business_date(self.config.timezone);
        let user = self.store.users().find_by_id(input.user_id)?;
        if user.is_restricted(today) {
            return Err(CoreError::domain(format!(
                "주문이 제한된 사용자입니다 ({}까지)",
                user.restricted_until.unwrap_or(today)
            )));
        }

        // 1차: 전 라인 검증 (어느 라인도 변경하기 전에)
        // 같은 상품이 여러 라인에 나뉘어도 합산 수량으로 재고를 검사한다.
        let products = self.store.products();
        let mut goods_amount = 0i64;
        let mut per_product: std::collections::HashMap<i64, i64> = std::collections::HashMap::new();
        for line in &input.lines {
            let product = products.find_by_id(line.product_id)?;
            if !product.is_orderable() {
                return Err(CoreError::domain("판매 중인 상품이 아닙니다"));
            }
            let requested = per_product.entry(line.product_id).or_insert(0);
            *requested += line.quantity;
            if let Some(stock) = product.stock {
                if stock < *requested {
                    return Err(CoreError::StockExceeded {
                        product_id: line.product_id,
                        requested: *requested,
                        available: stock,
                    });
                }
            }
            goods_amount += product.price * line.quantity;
        }

        let total_amount = goods_amount + input.shipping_fee;
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

        let repo = self.store.couriers();
        let code = display_code::generate_unique(
            'C',
            today,
            self.config.display_code_max_attempts,
            |c| repo.code_taken(c),
        )?;

        let pg_payment_amount = total_amount - input.point_to_use;
        // 외부 호출은 로컬 변경 전에
        let pg_tx_id = if pg_payment_amount > 0 {
            Some(self.gateway.ready(&code, pg_payment_amount).await?.transaction_id)
        } else {
            None
        };

        // 2차: 검증이 끝났으므로 라인별 재고 차감 (잠금 보유 중 — 실패 불가)
        let order_id = snowflake_id();
        let mut items = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            let product = self.stock.reserve_locked(line.product_id, line.quantity)?;
            items.push(CourierOrderItem {
                id: snowflake_id(),
                order_id,
                product_id: product.id,
                product_name: product.name.clone(),
                unit_price: product.price,
                quantity: line.quantity,
                item_status: ItemStatus::Normal,
            });
        }

        if input.point_to_use > 0 {
            self.points.use_points_locked(
                input.user_id,
                input.point_to_use,
                "택배 주문 결제",
                Some(PointRefType::CourierOrder),
                Some(order_id),
                Actor::User(input.user_id),
            )?;
        }

        let now = self.clock.now_millis();
        let order = CourierOrder {
            id: order_id,
            user_id: input.user_id,
            display_code: code,
            status: CourierStatus::PendingPayment,
            total_amount,
            point_used: input.point_to_use,
            pg_payment_amount,
            pg_tx_id,
            pg_approval_id: None,
            waybill_no: None,
            created_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            canceled_at: None,
        };
        let mut inserted = repo.insert(order, items)?;

        // 전액 포인트 결제는 즉시 결제완료
        if pg_payment_amount == 0 {
            inserted = self.mark_paid_locked(order_id, None)?;
        }

        tracing::info!(
            order_id,
            code = %inserted.display_code,
            total = total_amount,
            point_used = inserted.point_used,
            status = ?inserted.status,
            "Courier order ready"
        );
        Ok(inserted)
    }

    /// 결제 확정 — PENDING_PAYMENT → PAID 가드가 중복 웹훅을 구조적으로 차단
    pub async fn confirm_payment(
        &self,
        order_id: i64,
        approval_id: Option<&str>,
    ) -> CoreResult<CourierOrder> {
        let _guard = self.locks.lock(LockKey::Courier(order_id)).await?;
        self.mark_paid_locked(order_id, approval_id)
    }

    fn mark_paid_locked(
        &self,
        order_id: i64,
        approval_id: Option<&str>,
    ) -> CoreResult<CourierOrder> {
        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        let next = courier_table().apply(order.status, CourierEvent::Pay)?;

        let now = self.clock.now_millis();
        let approval = approval_id.map(str::to_string);
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.paid_at = Some(now);
            if approval.is_some() {
                o.pg_approval_id = approval.clone();
            }
        })?;
        tracing::info!(order_id, "Courier order paid");
        self.events.publish(DomainEvent::CourierPaid { order_id });
        Ok(updated)
    }

    /// 준비중 처리
    pub async fn prepare(&self, order_id: i64) -> CoreResult<CourierOrder> {
        let _guard = self.locks.lock(LockKey::Courier(order_id)).await?;
        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        let next = courier_table().apply(order.status, CourierEvent::Prepare)?;
        repo.update_with(order_id, |o| o.status = next).map_err(Into::into)
    }

    /// 발송 처리 — 운송장 필수, 재발송 금지
    pub async fn ship(&self, order_id: i64, waybill_no: &str) -> CoreResult<CourierOrder> {
        let _guard = self.locks.lock(LockKey::Courier(order_id)).await?;
        self.ship_locked(order_id, waybill_no)
    }

    /// 발송 본체 — 호출자가 주문 잠금을 보유 (운송장 일괄 등록 공용)
    pub(crate) fn ship_locked(&self, order_id: i64, waybill_no: &str) -> CoreResult<CourierOrder> {
        if waybill_no.trim().is_empty() {
            return Err(CoreError::validation("운송장 번호를 입력해야 합니다"));
        }
        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        if order.waybill_no.is_some() {
            return Err(CoreError::domain("이미 운송장이 등록된 주문입니다"));
        }
        let next = courier_table().apply(order.status, CourierEvent::Ship)?;

        let now = self.clock.now_millis();
        let waybill = waybill_no.trim().to_string();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.waybill_no = Some(waybill.clone());
            o.shipped_at = Some(now);
        })?;
        tracing::info!(order_id, waybill = %waybill, "Courier order shipped");
        self.events.publish(DomainEvent::CourierShipped {
            order_id,
            waybill_no: waybill,
        });
        Ok(updated)
    }

    /// 배송중 처리
    pub async fn mark_in_transit(&self, order_id: i64) -> CoreResult<CourierOrder> {
        let _guard = self.locks.lock(LockKey::Courier(order_id)).await?;
        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        let next = courier_table().apply(order.status, CourierEvent::Transit)?;
        repo.update_with(order_id, |o| o.status = next).map_err(Into::into)
    }

    /// 배송완료 처리
    pub async fn mark_delivered(&self, order_id: i64) -> CoreResult<CourierOrder> {
        let _guard = self.locks.lock(LockKey::Courier(order_id)).await?;
        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        let next = courier_table().apply(order.status, CourierEvent::Deliver)?;
        let now = self.clock.now_millis();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.delivered_at = Some(now);
        })?;
        self.events.publish(DomainEvent::CourierDelivered { order_id });
        Ok(updated)
    }

    /// 결제 전 사용자 취소
    pub async fn cancel(&self, order_id: i64, actor: &Actor) -> CoreResult<CourierOrder> {
        self.cancel_inner(order_id, actor, CourierEvent::Cancel).await
    }

    /// 결제 후 관리자 취소 (환불 동반)
    pub async fn admin_cancel(&self, order_id: i64, admin_id: i64) -> CoreResult<CourierOrder> {
        self.cancel_inner(order_id, &Actor::Admin(admin_id), CourierEvent::AdminCancel)
            .await
    }

    /// 결제 실패 처리 (정산 스위프)
    pub async fn fail_payment(&self, order_id: i64) -> CoreResult<CourierOrder> {
        self.cancel_inner(order_id, &Actor::System, CourierEvent::Fail).await
    }

    /// 취소/실패 공통 경로
    ///
    /// 라인별 재고 복원 + 포인트 홀드 복원. PG 환불은 결제가 실제로 잡혔고
    /// PG 결제분이 양수일 때만 — 전액 포인트 주문은 PG 호출이 0회여야 한다.
    async fn cancel_inner(
        &self,
        order_id: i64,
        actor: &Actor,
        event: CourierEvent,
    ) -> CoreResult<CourierOrder> {
        let existing = self.store.couriers().find_by_id(order_id)?;
        let _guards = self.locks.lock_many(self.cancel_lock_keys(&existing)).await?;

        let repo = self.store.couriers();
        let order = repo.find_by_id(order_id)?;
        if let Actor::User(uid) = actor {
            if order.user_id != *uid {
                return Err(CoreError::not_found("courier order", order_id));
            }
        }

        let previous = order.status;
        let next = courier_table().apply(order.status, event)?;

        // 검증 완료 후, 로컬 변경 전에 PG 환불
        let refund_needed = event == CourierEvent::AdminCancel && order.pg_payment_amount > 0;
        if refund_needed {
            let tx_id = order
                .pg_tx_id
                .as_deref()
                .ok_or_else(|| CoreError::domain("PG 거래 정보가 없는 주문입니다"))?;
            self.gateway
                .cancel(tx_id, order.pg_payment_amount, "주문 취소")
                .await?;
        }

        // 라인별 재고 복원
        let items = repo.items_of(order_id);
        for item in &items {
            self.stock.restore_locked(item.product_id, item.quantity)?;
        }

        // 포인트 홀드 복원
        if order.point_used > 0 {
            if let Some(hold) = self
                .store
                .points()
                .find_active_by_reference(PointRefType::CourierOrder, order_id)
            {
                self.points.cancel_use_locked(hold.id)?;
            }
        }

        let now = self.clock.now_millis();
        let updated = repo.update_with(order_id, |o| {
            o.status = next;
            o.canceled_at = Some(now);
        })?;

        tracing::info!(
            order_id,
            previous = ?previous,
            next = ?next,
            restored_lines = items.len(),
            refunded = if refund_needed { updated.pg_payment_amount } else { 0 },
            "Courier order canceled"
        );
        let domain_event = if event == CourierEvent::Fail {
            DomainEvent::CourierFailed { order_id }
        } else {
            DomainEvent::CourierCanceled { order_id }
        };
        self.events.publish(domain_event);
        Ok(updated)
    }

    /// 주문 + 라인 조회
    pub fn find_with_items(&self, order_id: i64) -> CoreResult<(CourierOrder, Vec<CourierOrderItem>)> {
        let order = self.store.couriers().find_by_id(order_id)?;
        let items = self.store.couriers().items_of(order_id);
        Ok((order, items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::payment::MockGateway;
    use shared::models::{CourierLineInput, ProductCreate, UserCreate};
    use std::time::Duration;

    struct Fixture {
        service: CourierService,
        gateway: Arc<MockGateway>,
        store: Arc<MemStore>,
        points: Arc<PointService>,
    }

    fn fixture() -> Fixture {
        let config = CoreConfig::for_tests();
        let store = Arc::new(MemStore::new());
        let locks = Arc::new(RowLockManager::new(Duration::from_millis(500)));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_noon(
            chrono::NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            config.timezone,
        ));
        let stock = Arc::new(StockEngine::new(Arc::clone(&store), Arc::clone(&locks)));
        let points = Arc::new(PointService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&clock),
        ));
        let gateway = Arc::new(MockGateway::new());
        let service = CourierService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            stock,
            Arc::clone(&points),
            gateway.clone(),
            clock,
            Arc::new(EventBus::new()),
            config,
        );
        Fixture {
            service,
            gateway,
            store,
            points,
        }
    }

    fn seed(fx: &Fixture, price: i64, stock: Option<i64>) -> (i64, i64) {
        let product = fx.store.products().create(ProductCreate {
            name: "크림빵".to_string(),
            price,
            stock,
            is_visible: true,
        });
        let user = fx.store.users().create(UserCreate {
            name: "이서준".to_string(),
        });
        (product.id, user.id)
    }

    fn order_input(product_id: i64, user_id: i64, quantity: i64, point_to_use: i64) -> CourierOrderCreate {
        CourierOrderCreate {
            user_id,
            lines: vec![CourierLineInput {
                product_id,
                quantity,
            }],
            shipping_fee: 3_000,
            point_to_use,
        }
    }

    #[tokio::test]
    async fn ready_reserves_stock_and_issues_pg_tx() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(10));

        let order = fx.service.ready(order_input(pid, uid, 2, 0)).await.unwrap();
        assert_eq!(order.status, CourierStatus::PendingPayment);
        assert_eq!(order.total_amount, 13_000);
        assert_eq!(order.pg_payment_amount, 13_000);
        assert!(order.pg_tx_id.is_some());
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(8));
    }

    #[tokio::test]
    async fn duplicate_payment_confirmation_is_rejected() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(10));
        let order = fx.service.ready(order_input(pid, uid, 1, 0)).await.unwrap();

        fx.service
            .confirm_payment(order.id, Some("appr-1"))
            .await
            .unwrap();
        // 중복 웹훅 시뮬레이션 — 두 번째 확정은 도메인 오류, 재고는 그대로
        let err = fx
            .service
            .confirm_payment(order.id, Some("appr-1"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Domain(_)));
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(9));
    }

    #[tokio::test]
    async fn fully_point_funded_order_never_touches_pg() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 10_000, Some(5));
        fx.points
            .earn(
                uid,
                13_000,
                shared::models::PointTxType::EarnPromotion,
                "적립",
                None,
                None,
                Actor::System,
            )
            .await
            .unwrap();

        let order = fx.service.ready(order_input(pid, uid, 1, 13_000)).await.unwrap();
        // 전액 포인트: PG 준비 호출 없음, 즉시 결제완료
        assert_eq!(order.status, CourierStatus::Paid);
        assert_eq!(order.pg_payment_amount, 0);
        assert!(order.pg_tx_id.is_none());
        assert_eq!(fx.gateway.ready_calls.load(std::sync::atomic::Ordering::SeqCst), 0);
        assert_eq!(fx.points.balance(uid).unwrap(), 0);

        // 취소 시 PG 환불 0회, 포인트 13000 복원
        fx.service.admin_cancel(order.id, 1).await.unwrap();
        assert_eq!(fx.gateway.cancel_call_count(), 0);
        assert_eq!(fx.points.balance(uid).unwrap(), 13_000);
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(5));
    }

    #[tokio::test]
    async fn admin_cancel_refunds_pg_portion_and_restores_everything() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(10));
        fx.points
            .earn(
                uid,
                3_000,
                shared::models::PointTxType::EarnPromotion,
                "적립",
                None,
                None,
                Actor::System,
            )
            .await
            .unwrap();

        let order = fx.service.ready(order_input(pid, uid, 2, 3_000)).await.unwrap();
        fx.service.confirm_payment(order.id, Some("appr-9")).await.unwrap();

        fx.service.admin_cancel(order.id, 7).await.unwrap();
        // PG 결제분 10000원만 환불, 포인트 3000 복원, 재고 복원
        assert_eq!(fx.gateway.cancel_call_count(), 1);
        assert_eq!(fx.points.balance(uid).unwrap(), 3_000);
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(10));

        let canceled = fx.store.couriers().find_by_id(order.id).unwrap();
        assert_eq!(canceled.status, CourierStatus::Canceled);
        assert!(canceled.canceled_at.is_some());
    }

    #[tokio::test]
    async fn ship_requires_waybill_and_forbids_reshipping() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(10));
        let order = fx.service.ready(order_input(pid, uid, 1, 0)).await.unwrap();
        fx.service.confirm_payment(order.id, None).await.unwrap();

        assert!(matches!(
            fx.service.ship(order.id, "  ").await.unwrap_err(),
            CoreError::Validation(_)
        ));

        let shipped = fx.service.ship(order.id, "1234-5678-9012").await.unwrap();
        assert_eq!(shipped.status, CourierStatus::Shipped);
        assert_eq!(shipped.waybill_no.as_deref(), Some("1234-5678-9012"));

        let err = fx.service.ship(order.id, "9999-0000-1111").await.unwrap_err();
        assert!(matches!(err, CoreError::Domain(_)));
    }

    #[tokio::test]
    async fn user_cancel_only_before_payment() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(10));
        let order = fx.service.ready(order_input(pid, uid, 3, 0)).await.unwrap();

        fx.service.cancel(order.id, &Actor::User(uid)).await.unwrap();
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(10));

        let order2 = fx.service.ready(order_input(pid, uid, 1, 0)).await.unwrap();
        fx.service.confirm_payment(order2.id, None).await.unwrap();
        // 결제 후에는 사용자 취소 이벤트가 테이블에 없다
        let err = fx.service.cancel(order2.id, &Actor::User(uid)).await.unwrap_err();
        assert!(matches!(err, CoreError::Domain(_)));
    }

    #[tokio::test]
    async fn split_lines_of_same_product_respect_combined_stock() {
        let fx = fixture();
        let (pid, uid) = seed(&fx, 5_000, Some(3));
        let input = CourierOrderCreate {
            user_id: uid,
            lines: vec![
                CourierLineInput {
                    product_id: pid,
                    quantity: 2,
                },
                CourierLineInput {
                    product_id: pid,
                    quantity: 2,
                },
            ],
            shipping_fee: 0,
            point_to_use: 0,
        };
        let err = fx.service.ready(input).await.unwrap_err();
        assert!(matches!(err, CoreError::StockExceeded { requested: 4, .. }));
        // 부분 차감 없이 전부 거부된다
        assert_eq!(fx.store.products().find_by_id(pid).unwrap().stock, Some(3));
    }
}
