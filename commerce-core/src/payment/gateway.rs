//! Payment gateway interface
//!
//! The PG is an untrusted, eventually-consistent, at-least-once event
//! source. Nothing in the core trusts a gateway response as exactly-once:
//! the `pay` transition's status guard is the idempotency barrier.

use crate::core::error::CoreError;
use async_trait::async_trait;
use thiserror::Error;

/// 결제 준비 응답
#[derive(Debug, Clone)]
pub struct PgReady {
    pub transaction_id: String,
    pub redirect_url: String,
}

/// 결제 승인 결과
#[derive(Debug, Clone)]
pub enum PgApproveResult {
    Approved { approval_id: String },
    Declined { reason: String },
}

/// PG가 보고하는 거래 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgStatus {
    /// 승인 완료
    Approved { approval_id: String },
    /// 아직 진행 중 — 다음 스위프 때 재확인
    Pending,
    /// 최종 실패
    Failed,
    /// 사용자/PG측 취소
    Canceled,
}

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 통신/일시 장애
    #[error("pg request failed: {0}")]
    Request(String),

    /// PG가 명시적으로 거부
    #[error("pg rejected: {0}")]
    Rejected(String),
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        CoreError::Gateway(err.to_string())
    }
}

/// 외부 결제 게이트웨이 클라이언트
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 결제 준비 — 거래 ID와 리다이렉트 URL 발급
    async fn ready(&self, order_code: &str, amount: i64) -> Result<PgReady, GatewayError>;

    /// 결제 승인 (리다이렉트 콜백 후)
    async fn approve(&self, transaction_id: &str) -> Result<PgApproveResult, GatewayError>;

    /// 거래 상태 조회 (정산 스위프)
    async fn query_status(&self, transaction_id: &str) -> Result<PgStatus, GatewayError>;

    /// 결제 취소/환불
    async fn cancel(
        &self,
        transaction_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<(), GatewayError>;
}
