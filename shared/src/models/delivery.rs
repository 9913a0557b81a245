//! Delivery Order Model (근거리 직접 배달)

use crate::order::DeliveryStatus;
use serde::{Deserialize, Serialize};

/// Delivery order entity
///
/// Bundles a user's pickup reservations for home delivery. Stock is held by
/// the linked reservations themselves; paying the delivery order flips them
/// PENDING → PICKED, canceling flips them back PICKED → PENDING (a reversible
/// link, distinct from a reservation's own cancel path).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrder {
    pub id: i64,
    pub user_id: i64,
    pub display_code: String,
    pub status: DeliveryStatus,
    /// 주문 총액 (상품 + 배달료, 원)
    pub total_amount: i64,
    /// 결제에 사용된 포인트
    pub point_used: i64,
    /// PG 결제 금액 = total_amount - point_used
    pub pg_payment_amount: i64,
    /// 결제 준비 시 PG가 발급한 거래 ID
    pub pg_tx_id: Option<String>,
    /// 결제 승인 ID (승인 후 기록)
    pub pg_approval_id: Option<String>,
    /// 연결된 픽업 예약 ID 목록
    pub reservation_ids: Vec<i64>,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    /// 기사 수락 시각 — 자동 배달완료 SLA 기준점
    pub accepted_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub canceled_at: Option<i64>,
}

/// Create delivery order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryOrderCreate {
    pub user_id: i64,
    pub reservation_ids: Vec<i64>,
    /// 배달료 (원)
    pub delivery_fee: i64,
    /// 사용할 포인트
    pub point_to_use: i64,
}
