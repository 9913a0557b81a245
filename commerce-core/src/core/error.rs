//! Core error taxonomy
//!
//! One enum, five classes with distinct handling policies:
//!
//! | class | retried | surfaced as |
//! |-------|---------|-------------|
//! | `Validation` | never | actionable message |
//! | `Domain` / `StockExceeded` / `InsufficientPoints` | never | message naming the allowed states/conditions |
//! | `LockTimeout` | by schedulers (bounded backoff) | transient failure |
//! | `Gateway` | caught per-item in sweeps | terminal failure for sync flows |
//! | `NotFound` | never | not-found (ownership mismatch included, 존재 여부 노출 방지) |

use thiserror::Error;

/// Core result type alias
pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    /// 입력값 오류 — 음수/0 수량·금액 등
    #[error("{0}")]
    Validation(String),

    /// 도메인 상태 오류 — 허용되지 않는 전이 등, 메시지에 허용 상태를 명시
    #[error("{0}")]
    Domain(String),

    /// 재고 부족
    #[error("재고가 부족합니다 (상품 {product_id}: 요청 {requested}, 잔여 {available})")]
    StockExceeded {
        product_id: i64,
        requested: i64,
        available: i64,
    },

    /// 포인트 잔액 부족
    #[error("포인트 잔액이 부족합니다 (요청 {requested}, 잔액 {balance})")]
    InsufficientPoints { requested: i64, balance: i64 },

    /// 행 잠금 획득 실패 — 재시도 가능한 동시성 오류
    #[error("row lock timeout: {0}")]
    LockTimeout(String),

    /// 외부 결제 게이트웨이 오류
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// 대상 없음 (소유권 불일치 포함)
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }

    pub fn domain(msg: impl Into<String>) -> Self {
        CoreError::Domain(msg.into())
    }

    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        CoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// 스케줄러가 자동 재시도해도 되는 오류인지
    ///
    /// Lock contention only. Domain/validation failures must surface
    /// unchanged — retrying them cannot succeed and hides bugs.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::LockTimeout(_))
    }
}
