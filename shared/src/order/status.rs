//! Status and lifecycle-event enums for the three order families

use serde::{Deserialize, Serialize};

// ============================================================================
// Reservation (매장 픽업 예약)
// ============================================================================

/// 예약 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// 픽업 대기
    #[default]
    Pending,
    /// 픽업 완료 (또는 연결된 배달 주문 결제로 전환)
    Picked,
    /// 취소됨
    Canceled,
}

impl ReservationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "픽업대기",
            ReservationStatus::Picked => "픽업완료",
            ReservationStatus::Canceled => "취소됨",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReservationStatus::Canceled)
    }
}

/// 예약 생명주기 이벤트
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationEvent {
    /// 픽업 처리 (매장 수령 또는 배달 결제 캐스케이드)
    Pick,
    /// 배달 주문 취소 캐스케이드로 픽업대기 복귀
    Release,
    /// 취소 (사용자/관리자/노쇼 스위프)
    Cancel,
}

impl ReservationEvent {
    pub fn label(&self) -> &'static str {
        match self {
            ReservationEvent::Pick => "픽업 처리",
            ReservationEvent::Release => "픽업 해제",
            ReservationEvent::Cancel => "예약 취소",
        }
    }
}

// ============================================================================
// Delivery order (근거리 직접 배달)
// ============================================================================

/// 배달 주문 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    /// 결제 대기
    #[default]
    PendingPayment,
    /// 결제 완료
    Paid,
    /// 배달 중 (기사 수락)
    OutForDelivery,
    /// 배달 완료
    Delivered,
    /// 취소됨
    Canceled,
    /// 결제 실패
    Failed,
}

impl DeliveryStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryStatus::PendingPayment => "결제대기",
            DeliveryStatus::Paid => "결제완료",
            DeliveryStatus::OutForDelivery => "배달중",
            DeliveryStatus::Delivered => "배달완료",
            DeliveryStatus::Canceled => "취소됨",
            DeliveryStatus::Failed => "결제실패",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Delivered | DeliveryStatus::Canceled | DeliveryStatus::Failed
        )
    }

    /// 결제 전이 가드: 결제대기 상태에서만 결제 확정 가능
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, DeliveryStatus::PendingPayment)
    }
}

/// 배달 주문 생명주기 이벤트
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryEvent {
    Pay,
    /// 기사 수락 → 배달 시작 (accepted_at 기록)
    Accept,
    Deliver,
    Cancel,
    Fail,
}

impl DeliveryEvent {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryEvent::Pay => "결제 처리",
            DeliveryEvent::Accept => "배달 수락",
            DeliveryEvent::Deliver => "배달완료 처리",
            DeliveryEvent::Cancel => "주문 취소",
            DeliveryEvent::Fail => "결제실패 처리",
        }
    }
}

// ============================================================================
// Courier order (택배 배송 주문)
// ============================================================================

/// 택배 주문 상태
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierStatus {
    /// 결제 대기
    #[default]
    PendingPayment,
    /// 결제 완료
    Paid,
    /// 상품 준비중
    Preparing,
    /// 발송됨 (운송장 등록)
    Shipped,
    /// 배송중
    InTransit,
    /// 배송 완료
    Delivered,
    /// 취소됨
    Canceled,
    /// 결제 실패
    Failed,
}

impl CourierStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CourierStatus::PendingPayment => "결제대기",
            CourierStatus::Paid => "결제완료",
            CourierStatus::Preparing => "준비중",
            CourierStatus::Shipped => "발송됨",
            CourierStatus::InTransit => "배송중",
            CourierStatus::Delivered => "배송완료",
            CourierStatus::Canceled => "취소됨",
            CourierStatus::Failed => "결제실패",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CourierStatus::Delivered | CourierStatus::Canceled | CourierStatus::Failed
        )
    }

    /// 결제 전이 가드: 결제대기 상태에서만 결제 확정 가능
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, CourierStatus::PendingPayment)
    }

    /// 클레임 접수 가능 여부 (결제 완료 이후 상태)
    pub fn claim_allowed(&self) -> bool {
        matches!(
            self,
            CourierStatus::Paid
                | CourierStatus::Preparing
                | CourierStatus::Shipped
                | CourierStatus::InTransit
                | CourierStatus::Delivered
        )
    }
}

/// 택배 주문 생명주기 이벤트
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourierEvent {
    Pay,
    Prepare,
    /// 운송장 등록 후 발송
    Ship,
    Transit,
    Deliver,
    /// 결제 전 사용자 취소
    Cancel,
    /// 결제 후 관리자 취소 (환불 동반)
    AdminCancel,
    Fail,
}

impl CourierEvent {
    pub fn label(&self) -> &'static str {
        match self {
            CourierEvent::Pay => "결제 처리",
            CourierEvent::Prepare => "준비중 처리",
            CourierEvent::Ship => "발송 처리",
            CourierEvent::Transit => "배송중 처리",
            CourierEvent::Deliver => "배송완료 처리",
            CourierEvent::Cancel => "주문 취소",
            CourierEvent::AdminCancel => "관리자 취소",
            CourierEvent::Fail => "결제실패 처리",
        }
    }
}

// ============================================================================
// Courier order item (부분 클레임용 개별 상태)
// ============================================================================

/// 주문 상품별 상태 — 부모 주문 상태와 독립적으로 부분 클레임을 추적
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    #[default]
    Normal,
    /// 클레임 접수됨
    ClaimRequested,
    /// 클레임 종결 (환불 없음)
    ClaimResolved,
    /// 환불됨
    Refunded,
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Normal => "정상",
            ItemStatus::ClaimRequested => "클레임접수",
            ItemStatus::ClaimResolved => "클레임종결",
            ItemStatus::Refunded => "환불됨",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_have_no_paid_guard() {
        assert!(!CourierStatus::Delivered.can_mark_paid());
        assert!(!CourierStatus::Canceled.can_mark_paid());
        assert!(CourierStatus::PendingPayment.can_mark_paid());
    }

    #[test]
    fn claim_gate_excludes_unpaid_and_terminal_failures() {
        assert!(!CourierStatus::PendingPayment.claim_allowed());
        assert!(!CourierStatus::Canceled.claim_allowed());
        assert!(!CourierStatus::Failed.claim_allowed());
        assert!(CourierStatus::Delivered.claim_allowed());
        assert!(CourierStatus::Paid.claim_allowed());
    }

    #[test]
    fn status_serde_uses_screaming_snake_case() {
        let s = serde_json::to_string(&CourierStatus::PendingPayment).unwrap();
        assert_eq!(s, "\"PENDING_PAYMENT\"");
        let back: CourierStatus = serde_json::from_str("\"IN_TRANSIT\"").unwrap();
        assert_eq!(back, CourierStatus::InTransit);
    }
}
