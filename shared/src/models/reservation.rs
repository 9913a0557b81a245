//! Reservation Model (매장 픽업 예약)

use crate::order::ReservationStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Reservation entity
///
/// A reservation holds stock from the moment it is created; cancellation
/// (user, admin, or the no-show sweep) restores it. Rows are never deleted —
/// CANCELED is a terminal status, not a removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    /// 고객 노출용 예약 코드 (시간 접두사 + 랜덤 접미사, 충돌 검사됨)
    pub display_code: String,
    pub status: ReservationStatus,
    pub quantity: i64,
    /// 예약 시점 단가 × 수량 (원)
    pub amount: i64,
    /// 픽업 예정일 (영업일 기준)
    pub pickup_date: NaiveDate,
    pub created_at: i64,
    pub picked_at: Option<i64>,
    pub canceled_at: Option<i64>,
}

/// Create reservation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationCreate {
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub pickup_date: NaiveDate,
}
