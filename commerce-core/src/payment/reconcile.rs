//! Payment reconciliation
//!
//! Two entry paths converge on the same `pay` transition:
//!
//! 1. **Synchronous callback** — the PG redirect supplies a display code;
//!    the order is looked up by code + owning user, the `can_mark_paid`
//!    guard is checked, and the gateway's `approve` result drives the
//!    transition.
//! 2. **Asynchronous sweep** — orders stuck in PENDING_PAYMENT with an
//!    issued PG transaction older than the grace window are settled against
//!    the PG's authoritative status. One bad order never blocks the sweep:
//!    per-order failures are logged and counted, the batch continues.
//!
//! Idempotency is structural — `pay` only moves PENDING_PAYMENT → PAID, so
//! a duplicate webhook or a sweep racing the callback ends in a domain
//! error, never a second side effect.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::core::error::{CoreError, CoreResult};
use crate::orders::{CourierService, DeliveryService};
use crate::payment::gateway::{PaymentGateway, PgApproveResult, PgStatus};
use crate::store::MemStore;
use serde::Serialize;
use shared::models::{CourierOrder, DeliveryOrder};
use std::sync::Arc;

/// 정산 스위프 집계
#[derive(Debug, Default, Clone, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub confirmed: usize,
    pub failed: usize,
    pub still_pending: usize,
    pub errors: usize,
}

pub struct PaymentReconciler {
    store: Arc<MemStore>,
    gateway: Arc<dyn PaymentGateway>,
    deliveries: Arc<DeliveryService>,
    couriers: Arc<CourierService>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl PaymentReconciler {
    pub fn new(
        store: Arc<MemStore>,
        gateway: Arc<dyn PaymentGateway>,
        deliveries: Arc<DeliveryService>,
        couriers: Arc<CourierService>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            deliveries,
            couriers,
            clock,
            config,
        }
    }

    // ========================================================================
    // Synchronous callbacks
    // ========================================================================

    /// 배달 주문 결제 콜백
    pub async fn confirm_delivery_callback(
        &self,
        display_code: &str,
        user_id: i64,
    ) -> CoreResult<DeliveryOrder> {
        let order = self
            .store
            .deliveries()
            .find_by_code_and_user(display_code, user_id)?;
        if !order.status.can_mark_paid() {
            return Err(CoreError::domain(format!(
                "결제 확정은 결제대기 상태에서만 가능합니다 (현재: {})",
                order.status.label()
            )));
        }
        let approval_id = self.approve_tx(order.pg_tx_id.as_deref(), order.id).await?;
        self.deliveries
            .confirm_payment(order.id, Some(&approval_id))
            .await
    }

    /// 택배 주문 결제 콜백
    pub async fn confirm_courier_callback(
        &self,
        display_code: &str,
        user_id: i64,
    ) -> CoreResult<CourierOrder> {
        let order = self
            .store
            .couriers()
            .find_by_code_and_user(display_code, user_id)?;
        if !order.status.can_mark_paid() {
            return Err(CoreError::domain(format!(
                "결제 확정은 결제대기 상태에서만 가능합니다 (현재: {})",
                order.status.label()
            )));
        }
        let approval_id = self.approve_tx(order.pg_tx_id.as_deref(), order.id).await?;
        self.couriers
            .confirm_payment(order.id, Some(&approval_id))
            .await
    }

    async fn approve_tx(&self, pg_tx_id: Option<&str>, order_id: i64) -> CoreResult<String> {
        let tx_id =
            pg_tx_id.ok_or_else(|| CoreError::domain("PG 거래 정보가 없는 주문입니다"))?;
        match self.gateway.approve(tx_id).await? {
            PgApproveResult::Approved { approval_id } => Ok(approval_id),
            PgApproveResult::Declined { reason } => {
                // 승인 거부는 주문을 건드리지 않는다 — 최종 상태는 스위프가 정리
                tracing::warn!(order_id, reason = %reason, "PG declined approval");
                Err(CoreError::Gateway(format!("결제 승인이 거부되었습니다: {reason}")))
            }
        }
    }

    // ========================================================================
    // Asynchronous sweep
    // ========================================================================

    /// 결제대기 정산 스위프
    ///
    /// 유예 시간을 넘긴 주문마다 PG의 실제 상태를 조회해 승인건은 `pay`,
    /// 최종 실패건은 `fail`, 진행 중이면 다음 스위프로 넘긴다.
    pub async fn sweep_pending(&self) -> SweepReport {
        let cutoff = self.clock.now_millis() - self.config.payment_grace_ms;
        let mut report = SweepReport::default();

        for order in self.store.deliveries().find_pending_payment_before(cutoff) {
            let Some(tx_id) = order.pg_tx_id.clone() else {
                continue;
            };
            self.settle_one(&mut report, order.id, &tx_id, Family::Delivery)
                .await;
        }
        for order in self.store.couriers().find_pending_payment_before(cutoff) {
            let Some(tx_id) = order.pg_tx_id.clone() else {
                continue;
            };
            self.settle_one(&mut report, order.id, &tx_id, Family::Courier)
                .await;
        }

        tracing::info!(
            scanned = report.scanned,
            confirmed = report.confirmed,
            failed = report.failed,
            still_pending = report.still_pending,
            errors = report.errors,
            "Payment sweep finished"
        );
        report
    }

    async fn settle_one(&self, report: &mut SweepReport, order_id: i64, tx_id: &str, family: Family) {
        report.scanned += 1;
        // 주문 단위 실패는 배치를 중단하지 않는다
        match self.gateway.query_status(tx_id).await {
            Ok(PgStatus::Approved { approval_id }) => {
                let result = match family {
                    Family::Delivery => self
                        .deliveries
                        .confirm_payment(order_id, Some(&approval_id))
                        .await
                        .map(|_| ()),
                    Family::Courier => self
                        .couriers
                        .confirm_payment(order_id, Some(&approval_id))
                        .await
                        .map(|_| ()),
                };
                match result {
                    Ok(()) => report.confirmed += 1,
                    Err(e) => {
                        tracing::warn!(order_id, error = %e, "Sweep confirm failed");
                        report.errors += 1;
                    }
                }
            }
            Ok(PgStatus::Failed | PgStatus::Canceled) => {
                let result = match family {
                    Family::Delivery => self.deliveries.fail_payment(order_id).await.map(|_| ()),
                    Family::Courier => self.couriers.fail_payment(order_id).await.map(|_| ()),
                };
                match result {
                    Ok(()) => report.failed += 1,
                    Err(e) => {
                        tracing::warn!(order_id, error = %e, "Sweep fail-transition failed");
                        report.errors += 1;
                    }
                }
            }
            Ok(PgStatus::Pending) => report.still_pending += 1,
            Err(e) => {
                tracing::warn!(order_id, tx_id, error = %e, "PG query failed, skipping order");
                report.errors += 1;
            }
        }
    }
}

#[derive(Clone, Copy)]
enum Family {
    Delivery,
    Courier,
}
