//! User Model

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// User entity (사용자)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// 비정규화 포인트 잔액 — 원장(`PointTransaction`)에서 항상 재계산 가능
    pub point_balance: i64,
    /// 당월 노쇼 경고 횟수 (월초 리셋)
    pub monthly_warn_count: i32,
    /// 이 날짜까지 신규 주문 제한 (해당 날짜 포함)
    pub restricted_until: Option<NaiveDate>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// 주문 제한 중인지 여부 (영업일 기준 오늘을 받아 판정)
    pub fn is_restricted(&self, today: NaiveDate) -> bool {
        self.restricted_until.is_some_and(|until| until >= today)
    }
}

/// Create user payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCreate {
    pub name: String,
}
