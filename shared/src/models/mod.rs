//! Entity models
//!
//! Plain data rows persisted by the core; all behavior lives in the
//! `commerce-core` services. Timestamps are Unix millis (`i64`), money is
//! integer KRW.

mod claim;
mod courier;
mod delivery;
mod point;
mod product;
mod reservation;
mod user;

pub use claim::*;
pub use courier::*;
pub use delivery::*;
pub use point::*;
pub use product::*;
pub use reservation::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// 작업 수행 주체 — 감사/포인트 이력에 기록
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "id")]
pub enum Actor {
    /// 일반 사용자
    User(i64),
    /// 관리자
    Admin(i64),
    /// 스케줄러/정산 배치
    System,
}
