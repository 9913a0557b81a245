//! Claim sub-machine (배송 후 클레임)
//!
//! REQUESTED → IN_REVIEW → {APPROVED, REJECTED} → RESOLVED, attached to a
//! courier order. Creation is gated on the parent being paid-or-later;
//! approval can refund through the same PG dispatch as order cancellation
//! and/or grant point compensation; resolution is terminal.
//!
//! Item rows are only ever mutated under their parent order's row lock.

use crate::core::clock::Clock;
use crate::core::error::{CoreError, CoreResult};
use crate::orders::events::{DomainEvent, EventBus};
use crate::payment::PaymentGateway;
use crate::points::PointService;
use crate::store::{LockKey, MemStore, RowLockManager};
use shared::models::{
    Actor, ClaimStatus, ClaimType, CourierClaim, PointRefType, PointTxType, ReturnStatus,
};
use shared::order::ItemStatus;
use shared::util::snowflake_id;
use std::sync::Arc;

/// 승인 시 처리 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimAction {
    /// PG 환불 수행
    Refund,
    /// 메모만 남김 (포인트 보상은 별도 지정 가능)
    Note,
}

/// 클레임 접수 입력
#[derive(Debug, Clone)]
pub struct ClaimCreate {
    pub order_id: i64,
    pub user_id: i64,
    pub claim_type: ClaimType,
    pub content: String,
    /// 특정 상품 대상 클레임이면 카탈로그 상품 ID (아이템 ID가 아님)
    pub product_id: Option<i64>,
}

/// 승인 결정 입력
#[derive(Debug, Clone)]
pub struct ClaimDecision {
    pub action: ClaimAction,
    pub note: Option<String>,
    /// 환불 금액 — 생략 시 대상 라인 금액
    pub refund_amount: Option<i64>,
    /// 포인트 보상 금액
    pub point_amount: Option<i64>,
    /// 반품 수거 필요 여부
    pub return_required: bool,
}

pub struct ClaimService {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    points: Arc<PointService>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    events: Arc<EventBus>,
}

impl ClaimService {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        points: Arc<PointService>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            locks,
            points,
            gateway,
            clock,
            events,
        }
    }

    /// 클레임 접수
    ///
    /// 결제 완료 이후 상태에서만 가능. 상품을 지정하면 해당 라인을
    /// CLAIM_REQUESTED로 전환하고, 지정하지 않으면 주문 전체 클레임이다.
    pub async fn create(&self, input: ClaimCreate) -> CoreResult<CourierClaim> {
        if input.content.trim().is_empty() {
            return Err(CoreError::validation("문의 내용을 입력해야 합니다"));
        }

        let _guard = self.locks.lock(LockKey::Courier(input.order_id)).await?;

        let couriers = self.store.couriers();
        let order = couriers.find_by_id(input.order_id)?;
        if order.user_id != input.user_id {
            return Err(CoreError::not_found("courier order", input.order_id));
        }
        if !order.status.claim_allowed() {
            return Err(CoreError::domain("결제 완료 후 문의가 가능합니다"));
        }

        // 상품 지정 클레임: 카탈로그 상품 ID로 라인을 찾는다
        let target_item_id = match input.product_id {
            Some(product_id) => {
                let item = couriers
                    .items_of(input.order_id)
                    .into_iter()
                    .find(|i| i.product_id == product_id)
                    .ok_or_else(|| {
                        CoreError::domain("해당 주문에 일치하는 상품이 없습니다")
                    })?;
                couriers.update_item_with(item.id, |i| {
                    i.item_status = ItemStatus::ClaimRequested;
                })?;
                Some(item.id)
            }
            None => None,
        };

        let claim = CourierClaim {
            id: snowflake_id(),
            order_id: input.order_id,
            item_id: target_item_id,
            user_id: input.user_id,
            claim_type: input.claim_type,
            status: ClaimStatus::Requested,
            content: input.content,
            admin_note: None,
            refund_amount: None,
            point_compensation: None,
            fee_bearer: input.claim_type.default_fee_bearer(),
            return_status: None,
            created_at: self.clock.now_millis(),
            resolved_at: None,
        };
        let inserted = self.store.claims().insert(claim);

        tracing::info!(
            claim_id = inserted.id,
            order_id = inserted.order_id,
            claim_type = ?inserted.claim_type,
            targeted_item = ?inserted.item_id,
            "Claim requested"
        );
        self.events.publish(DomainEvent::ClaimRequested {
            claim_id: inserted.id,
            order_id: inserted.order_id,
        });
        Ok(inserted)
    }

    /// 검토 시작 (REQUESTED → IN_REVIEW)
    pub async fn start_review(&self, claim_id: i64) -> CoreResult<CourierClaim> {
        let _guard = self.locks.lock(LockKey::Claim(claim_id)).await?;
        let repo = self.store.claims();
        let claim = repo.find_by_id(claim_id)?;
        if claim.status != ClaimStatus::Requested {
            return Err(CoreError::domain("검토 시작은 접수됨 상태에서만 가능합니다"));
        }
        repo.update_with(claim_id, |c| c.status = ClaimStatus::InReview)
            .map_err(Into::into)
    }

    /// 승인 처리
    ///
    /// REFUND: 주문 취소와 동일한 PG 디스패치로 환불하고 대상 라인을
    /// REFUNDED, 클레임을 RESOLVED로 종결한다. NOTE: 메모만 남기고
    /// APPROVED 상태로 두되, 포인트 보상이 지정되면 PG 없이 적립한다.
    /// 두 경로 모두 포인트 보상을 함께 지급할 수 있다.
    pub async fn approve(&self, claim_id: i64, decision: ClaimDecision) -> CoreResult<CourierClaim> {
        let existing = self.store.claims().find_by_id(claim_id)?;
        let order = self.store.couriers().find_by_id(existing.order_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Claim(claim_id),
                LockKey::Courier(existing.order_id),
                LockKey::User(existing.user_id),
            ])
            .await?;

        let repo = self.store.claims();
        let claim = repo.find_by_id(claim_id)?;
        if !claim.status.is_decidable() {
            return Err(CoreError::domain(format!(
                "승인할 수 없는 상태입니다 (현재: {})",
                claim.status.label()
            )));
        }

        if let Some(point_amount) = decision.point_amount {
            if point_amount < 0 {
                return Err(CoreError::validation("포인트 보상은 음수일 수 없습니다"));
            }
        }

        let now = self.clock.now_millis();
        let mut refund_amount: Option<i64> = None;

        match decision.action {
            ClaimAction::Refund => {
                // 환불 금액 기본값: 대상 라인 금액
                let amount = match decision.refund_amount {
                    Some(a) => a,
                    None => {
                        let item_id = claim.item_id.ok_or_else(|| {
                            CoreError::validation(
                                "대상 상품이 없는 클레임은 환불 금액을 지정해야 합니다",
                            )
                        })?;
                        self.store.couriers().find_item(item_id)?.line_amount()
                    }
                };
                if amount <= 0 {
                    return Err(CoreError::validation("환불 금액은 0보다 커야 합니다"));
                }
                let tx_id = order
                    .pg_tx_id
                    .as_deref()
                    .ok_or_else(|| CoreError::domain("PG 결제 내역이 없는 주문입니다"))?;
                // 주문 취소와 같은 PG 디스패치 — 검증 후, 로컬 변경 전에 호출
                self.gateway.cancel(tx_id, amount, "클레임 환불").await?;
                refund_amount = Some(amount);

                if let Some(item_id) = claim.item_id {
                    self.store.couriers().update_item_with(item_id, |i| {
                        i.item_status = ItemStatus::Refunded;
                    })?;
                }
            }
            ClaimAction::Note => {}
        }

        // 포인트 보상 — 환불과 독립적으로, PG를 거치지 않는다
        if let Some(point_amount) = decision.point_amount.filter(|&a| a > 0) {
            self.points.earn_locked(
                claim.user_id,
                point_amount,
                PointTxType::EarnCompensation,
                "클레임 보상",
                Some(PointRefType::Claim),
                Some(claim_id),
                Actor::System,
            )?;
        }

        let resolved = decision.action == ClaimAction::Refund;
        let updated = repo.update_with(claim_id, |c| {
            c.status = if resolved {
                ClaimStatus::Resolved
            } else {
                ClaimStatus::Approved
            };
            c.admin_note = decision.note.clone();
            c.refund_amount = refund_amount;
            c.point_compensation = decision.point_amount;
            if decision.return_required {
                c.return_status = Some(ReturnStatus::Collecting);
            }
            if resolved {
                c.resolved_at = Some(now);
            }
        })?;

        tracing::info!(
            claim_id,
            action = ?decision.action,
            refund = ?refund_amount,
            points = ?decision.point_amount,
            return_required = decision.return_required,
            "Claim approved"
        );
        self.events.publish(DomainEvent::ClaimDecided {
            claim_id,
            approved: true,
        });
        Ok(updated)
    }

    /// 거절 처리 — 대상 라인은 CLAIM_RESOLVED (환불 아님)
    pub async fn reject(&self, claim_id: i64, note: Option<String>) -> CoreResult<CourierClaim> {
        let existing = self.store.claims().find_by_id(claim_id)?;
        let _guards = self
            .locks
            .lock_many(vec![
                LockKey::Claim(claim_id),
                LockKey::Courier(existing.order_id),
            ])
            .await?;

        let repo = self.store.claims();
        let claim = repo.find_by_id(claim_id)?;
        if !claim.status.is_decidable() {
            return Err(CoreError::domain(format!(
                "거절할 수 없는 상태입니다 (현재: {})",
                claim.status.label()
            )));
        }

        if let Some(item_id) = claim.item_id {
            self.store.couriers().update_item_with(item_id, |i| {
                i.item_status = ItemStatus::ClaimResolved;
            })?;
        }

        let now = self.clock.now_millis();
        let updated = repo.update_with(claim_id, |c| {
            c.status = ClaimStatus::Rejected;
            c.admin_note = note.clone();
            c.resolved_at = Some(now);
        })?;

        tracing::info!(claim_id, "Claim rejected");
        self.events.publish(DomainEvent::ClaimDecided {
            claim_id,
            approved: false,
        });
        Ok(updated)
    }

    /// 종결 처리 (APPROVED/REJECTED → RESOLVED) — 되돌릴 수 없다
    pub async fn resolve(&self, claim_id: i64) -> CoreResult<CourierClaim> {
        let _guard = self.locks.lock(LockKey::Claim(claim_id)).await?;
        let repo = self.store.claims();
        let claim = repo.find_by_id(claim_id)?;
        if !matches!(claim.status, ClaimStatus::Approved | ClaimStatus::Rejected) {
            return Err(CoreError::domain(
                "종결은 승인됨 또는 거절됨 상태에서만 가능합니다",
            ));
        }
        let now = self.clock.now_millis();
        repo.update_with(claim_id, |c| {
            c.status = ClaimStatus::Resolved;
            if c.resolved_at.is_none() {
                c.resolved_at = Some(now);
            }
        })
        .map_err(Into::into)
    }

    /// 반품 수거 상태 갱신 — 허용된 단방향 전환만
    pub async fn update_return_status(
        &self,
        claim_id: i64,
        next: ReturnStatus,
    ) -> CoreResult<CourierClaim> {
        let _guard = self.locks.lock(LockKey::Claim(claim_id)).await?;
        let repo = self.store.claims();
        let claim = repo.find_by_id(claim_id)?;
        let current = claim
            .return_status
            .ok_or_else(|| CoreError::domain("반품 수거가 시작되지 않은 클레임입니다"))?;
        if !current.can_advance_to(next) {
            return Err(CoreError::domain("허용되지 않는 반품 상태 전환입니다"));
        }
        repo.update_with(claim_id, |c| c.return_status = Some(next))
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::FixedClock;
    use crate::payment::MockGateway;
    use shared::models::{CourierOrder, CourierOrderItem, ProductCreate, UserCreate};
    use shared::order::CourierStatus;
    use std::time::Duration;

    struct Fixture {
        service: ClaimService,
        gateway: Arc<MockGateway>,
        store: Arc<MemStore>,
        points: Arc<PointService>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemStore::new());
        let locks = Arc::new(RowLockManager::new(Duration::from_millis(500)));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at(1_754_000_000_000));
        let points = Arc::new(PointService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&clock),
        ));
        let gateway = Arc::new(MockGateway::new());
        let service = ClaimService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&points),
            gateway.clone(),
            clock,
            Arc::new(EventBus::new()),
        );
        Fixture {
            service,
            gateway,
            store,
            points,
        }
    }

    /// 지정 상태의 택배 주문 + 라인 1개를 직접 심는다
    fn seed_order(fx: &Fixture, status: CourierStatus) -> (CourierOrder, CourierOrderItem) {
        let product = fx.store.products().create(ProductCreate {
            name: "마들렌 세트".to_string(),
            price: 12_000,
            stock: Some(10),
            is_visible: true,
        });
        let user = fx.store.users().create(UserCreate {
            name: "정유진".to_string(),
        });
        let order_id = shared::util::snowflake_id();
        let order = CourierOrder {
            id: order_id,
            user_id: user.id,
            display_code: format!("C260806-T{order_id:x}"),
            status,
            total_amount: 24_000,
            point_used: 0,
            pg_payment_amount: 24_000,
            pg_tx_id: Some("pg-tx-claim".to_string()),
            pg_approval_id: Some("appr-claim".to_string()),
            waybill_no: None,
            created_at: 0,
            paid_at: Some(0),
            shipped_at: None,
            delivered_at: None,
            canceled_at: None,
        };
        let item = CourierOrderItem {
            id: shared::util::snowflake_id(),
            order_id,
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: 12_000,
            quantity: 2,
            item_status: ItemStatus::Normal,
        };
        let order = fx.store.couriers().insert(order, vec![item.clone()]).unwrap();
        (order, item)
    }

    fn create_input(order: &CourierOrder, product_id: Option<i64>) -> ClaimCreate {
        ClaimCreate {
            order_id: order.id,
            user_id: order.user_id,
            claim_type: ClaimType::Defect,
            content: "상자가 파손되어 왔습니다".to_string(),
            product_id,
        }
    }

    #[tokio::test]
    async fn claim_requires_paid_parent() {
        let fx = fixture();
        let (order, _) = seed_order(&fx, CourierStatus::PendingPayment);
        let err = fx.service.create(create_input(&order, None)).await.unwrap_err();
        assert_eq!(err.to_string(), "결제 완료 후 문의가 가능합니다");

        let (delivered, _) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx.service.create(create_input(&delivered, None)).await.unwrap();
        assert_eq!(claim.status, ClaimStatus::Requested);
    }

    #[tokio::test]
    async fn targeted_claim_flips_item_and_unknown_product_fails() {
        let fx = fixture();
        let (order, item) = seed_order(&fx, CourierStatus::Delivered);

        let claim = fx
            .service
            .create(create_input(&order, Some(item.product_id)))
            .await
            .unwrap();
        assert_eq!(claim.item_id, Some(item.id));
        assert_eq!(
            fx.store.couriers().find_item(item.id).unwrap().item_status,
            ItemStatus::ClaimRequested
        );

        let err = fx
            .service
            .create(create_input(&order, Some(999_999)))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "해당 주문에 일치하는 상품이 없습니다");
    }

    #[tokio::test]
    async fn change_of_mind_defaults_fee_to_customer() {
        let fx = fixture();
        let (order, _) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx
            .service
            .create(ClaimCreate {
                claim_type: ClaimType::ChangeOfMind,
                ..create_input(&order, None)
            })
            .await
            .unwrap();
        assert_eq!(claim.fee_bearer, shared::models::FeeBearer::Customer);
    }

    #[tokio::test]
    async fn refund_approval_defaults_to_line_amount_and_resolves() {
        let fx = fixture();
        let (order, item) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx
            .service
            .create(create_input(&order, Some(item.product_id)))
            .await
            .unwrap();

        let updated = fx
            .service
            .approve(
                claim.id,
                ClaimDecision {
                    action: ClaimAction::Refund,
                    note: Some("파손 확인".to_string()),
                    refund_amount: None,
                    point_amount: None,
                    return_required: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ClaimStatus::Resolved);
        assert_eq!(updated.refund_amount, Some(24_000)); // 12000 × 2
        assert_eq!(updated.return_status, Some(ReturnStatus::Collecting));
        assert!(updated.resolved_at.is_some());
        assert_eq!(fx.gateway.cancel_call_count(), 1);
        assert_eq!(
            fx.store.couriers().find_item(item.id).unwrap().item_status,
            ItemStatus::Refunded
        );

        // 종결 이후 재승인 불가
        let err = fx
            .service
            .approve(
                claim.id,
                ClaimDecision {
                    action: ClaimAction::Note,
                    note: None,
                    refund_amount: None,
                    point_amount: None,
                    return_required: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Domain(_)));
    }

    #[tokio::test]
    async fn note_approval_grants_points_without_pg() {
        let fx = fixture();
        let (order, _) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx.service.create(create_input(&order, None)).await.unwrap();

        let updated = fx
            .service
            .approve(
                claim.id,
                ClaimDecision {
                    action: ClaimAction::Note,
                    note: Some("사과 말씀과 함께 포인트 지급".to_string()),
                    refund_amount: None,
                    point_amount: Some(2_000),
                    return_required: false,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, ClaimStatus::Approved);
        assert_eq!(fx.gateway.cancel_call_count(), 0);
        assert_eq!(fx.points.balance(order.user_id).unwrap(), 2_000);

        // 이후 종결
        let resolved = fx.service.resolve(claim.id).await.unwrap();
        assert_eq!(resolved.status, ClaimStatus::Resolved);
    }

    #[tokio::test]
    async fn reject_marks_item_resolved_not_refunded() {
        let fx = fixture();
        let (order, item) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx
            .service
            .create(create_input(&order, Some(item.product_id)))
            .await
            .unwrap();
        fx.service.start_review(claim.id).await.unwrap();

        let updated = fx
            .service
            .reject(claim.id, Some("단순 변심으로 판단".to_string()))
            .await
            .unwrap();
        assert_eq!(updated.status, ClaimStatus::Rejected);
        assert!(updated.resolved_at.is_some());
        assert_eq!(
            fx.store.couriers().find_item(item.id).unwrap().item_status,
            ItemStatus::ClaimResolved
        );
    }

    #[tokio::test]
    async fn return_flow_advances_one_way_only() {
        let fx = fixture();
        let (order, item) = seed_order(&fx, CourierStatus::Delivered);
        let claim = fx
            .service
            .create(create_input(&order, Some(item.product_id)))
            .await
            .unwrap();
        fx.service
            .approve(
                claim.id,
                ClaimDecision {
                    action: ClaimAction::Refund,
                    note: None,
                    refund_amount: Some(12_000),
                    point_amount: None,
                    return_required: true,
                },
            )
            .await
            .unwrap();

        fx.service
            .update_return_status(claim.id, ReturnStatus::Collected)
            .await
            .unwrap();
        let err = fx
            .service
            .update_return_status(claim.id, ReturnStatus::Collecting)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Domain(_)));
        fx.service
            .update_return_status(claim.id, ReturnStatus::Completed)
            .await
            .unwrap();
    }
}
