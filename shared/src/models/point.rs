//! Point Transaction Model (포인트 원장)

use super::Actor;
use serde::{Deserialize, Serialize};

/// 포인트 거래 유형
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointTxType {
    /// 구매 적립
    EarnPurchase,
    /// 클레임 보상 적립
    EarnCompensation,
    /// 프로모션/관리자 일괄 지급
    EarnPromotion,
    /// 주문 결제 사용
    UsePurchase,
    /// 적립 취소 (보상 거래)
    CancelEarn,
    /// 사용 취소 (보상 거래)
    CancelUse,
}

impl PointTxType {
    /// EARN_* 계열 여부
    pub fn is_earn(&self) -> bool {
        matches!(
            self,
            PointTxType::EarnPurchase | PointTxType::EarnCompensation | PointTxType::EarnPromotion
        )
    }

    /// USE_* 계열 여부
    pub fn is_use(&self) -> bool {
        matches!(self, PointTxType::UsePurchase)
    }
}

/// 포인트 거래가 참조하는 원인 엔티티 종류
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointRefType {
    Reservation,
    DeliveryOrder,
    CourierOrder,
    Claim,
}

/// Point ledger row — append-only
///
/// `balance_after` is the post-mutation snapshot; the running sum of all
/// rows for a user always equals the user's denormalized `point_balance`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointTransaction {
    pub id: i64,
    pub user_id: i64,
    pub tx_type: PointTxType,
    /// 부호 있는 변동량 (적립 +, 사용/취소 -)
    pub amount: i64,
    /// 반영 직후 잔액 스냅샷
    pub balance_after: i64,
    pub reason: String,
    pub reference_type: Option<PointRefType>,
    pub reference_id: Option<i64>,
    /// 이 거래를 상쇄한 보상 거래가 존재하면 true (이중 취소 방지)
    pub canceled: bool,
    pub actor: Actor,
    pub created_at: i64,
}
