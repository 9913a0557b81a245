//! Courier Claim Model (배송 후 클레임)

use serde::{Deserialize, Serialize};

/// 클레임 유형
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimType {
    /// 단순 변심 — 반품 배송비 고객 부담
    ChangeOfMind,
    /// 상품 하자
    Defect,
    /// 오배송
    WrongDelivery,
    /// 기타 문의
    Other,
}

impl ClaimType {
    /// 반품 배송비 기본 부담 주체
    pub fn default_fee_bearer(&self) -> FeeBearer {
        match self {
            ClaimType::ChangeOfMind => FeeBearer::Customer,
            _ => FeeBearer::Seller,
        }
    }
}

/// 클레임 상태: REQUESTED → IN_REVIEW → {APPROVED, REJECTED} → RESOLVED
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClaimStatus {
    #[default]
    Requested,
    InReview,
    Approved,
    Rejected,
    /// 종결 — 되돌릴 수 없음
    Resolved,
}

impl ClaimStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ClaimStatus::Requested => "접수됨",
            ClaimStatus::InReview => "검토중",
            ClaimStatus::Approved => "승인됨",
            ClaimStatus::Rejected => "거절됨",
            ClaimStatus::Resolved => "종결됨",
        }
    }

    /// 승인/거절 가능 상태 (접수됨 또는 검토중)
    pub fn is_decidable(&self) -> bool {
        matches!(self, ClaimStatus::Requested | ClaimStatus::InReview)
    }
}

/// 반품 배송비 부담 주체
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeeBearer {
    Customer,
    Seller,
}

/// 반품 수거 진행 상태 (승인 시 반품 필요로 표시된 경우에만)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    /// 수거 중
    Collecting,
    /// 수거 완료
    Collected,
    /// 반품 입고/검수 완료
    Completed,
}

impl ReturnStatus {
    /// 허용된 다음 상태인지 검사 — 수거 흐름은 한 방향으로만 진행
    pub fn can_advance_to(&self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (ReturnStatus::Collecting, ReturnStatus::Collected)
                | (ReturnStatus::Collected, ReturnStatus::Completed)
        )
    }
}

/// Courier claim entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourierClaim {
    pub id: i64,
    pub order_id: i64,
    /// 특정 주문 라인 대상 클레임이면 해당 아이템 ID
    pub item_id: Option<i64>,
    pub user_id: i64,
    pub claim_type: ClaimType,
    pub status: ClaimStatus,
    /// 고객 문의 내용
    pub content: String,
    pub admin_note: Option<String>,
    /// 승인 시 확정된 환불 금액 (원)
    pub refund_amount: Option<i64>,
    /// 포인트 보상 금액
    pub point_compensation: Option<i64>,
    pub fee_bearer: FeeBearer,
    pub return_status: Option<ReturnStatus>,
    pub created_at: i64,
    pub resolved_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_of_mind_puts_fee_on_customer() {
        assert_eq!(ClaimType::ChangeOfMind.default_fee_bearer(), FeeBearer::Customer);
        assert_eq!(ClaimType::Defect.default_fee_bearer(), FeeBearer::Seller);
        assert_eq!(ClaimType::WrongDelivery.default_fee_bearer(), FeeBearer::Seller);
    }

    #[test]
    fn return_flow_is_one_way() {
        assert!(ReturnStatus::Collecting.can_advance_to(ReturnStatus::Collected));
        assert!(ReturnStatus::Collected.can_advance_to(ReturnStatus::Completed));
        assert!(!ReturnStatus::Collected.can_advance_to(ReturnStatus::Collecting));
        assert!(!ReturnStatus::Collecting.can_advance_to(ReturnStatus::Completed));
    }
}
