//! Courier Order Model (택배 배송 주문)

use crate::order::{CourierStatus, ItemStatus};
use serde::{Deserialize, Serialize};

/// Courier order entity
///
/// A standalone purchase shipped by parcel courier. Line items snapshot the
/// catalog name/price at order time; stock is reserved per line at creation
/// and restored on cancel/fail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierOrder {
    pub id: i64,
    pub user_id: i64,
    pub display_code: String,
    pub status: CourierStatus,
    /// 주문 총액 (원)
    pub total_amount: i64,
    /// 결제에 사용된 포인트
    pub point_used: i64,
    /// PG 결제 금액 = total_amount - point_used
    pub pg_payment_amount: i64,
    pub pg_tx_id: Option<String>,
    pub pg_approval_id: Option<String>,
    /// 운송장 번호 — 한 번 등록되면 재등록 불가
    pub waybill_no: Option<String>,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    pub shipped_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub canceled_at: Option<i64>,
}

/// Courier order line item (카탈로그 스냅샷)
///
/// Carries its own `item_status` independent of the parent order so a claim
/// can target a single line of a multi-line order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    /// 주문 시점 상품명 스냅샷
    pub product_name: String,
    /// 주문 시점 단가 스냅샷 (원)
    pub unit_price: i64,
    pub quantity: i64,
    pub item_status: ItemStatus,
}

impl CourierOrderItem {
    /// 라인 금액 (단가 × 수량)
    pub fn line_amount(&self) -> i64 {
        self.unit_price * self.quantity
    }
}

/// Create courier order payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierOrderCreate {
    pub user_id: i64,
    pub lines: Vec<CourierLineInput>,
    /// 배송비 (원)
    pub shipping_fee: i64,
    /// 사용할 포인트
    pub point_to_use: i64,
}

/// 주문 라인 입력
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierLineInput {
    pub product_id: i64,
    pub quantity: i64,
}
