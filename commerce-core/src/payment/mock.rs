//! Scripted mock gateway
//!
//! Deterministic stand-in for tests and local runs: transactions default to
//! Pending after `ready`, are approved by `approve`, and can be scripted to
//! any status or to fail outright per transaction. Call counters let tests
//! assert exactly how many PG calls a flow made (e.g. the refund-skip rule
//! for fully point-funded orders).

use super::gateway::{GatewayError, PaymentGateway, PgApproveResult, PgReady, PgStatus};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Default)]
pub struct MockGateway {
    statuses: DashMap<String, PgStatus>,
    /// 이 거래에 대한 모든 호출이 통신 오류를 낸다
    broken_txs: DashSet<String>,
    /// 전역 장애 플래그
    outage: AtomicBool,
    seq: AtomicU64,
    pub ready_calls: AtomicUsize,
    pub approve_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// 특정 거래의 상태를 스크립트
    pub fn set_status(&self, transaction_id: &str, status: PgStatus) {
        self.statuses.insert(transaction_id.to_string(), status);
    }

    /// 특정 거래 조회/승인이 통신 오류를 내도록 설정
    pub fn break_tx(&self, transaction_id: &str) {
        self.broken_txs.insert(transaction_id.to_string());
    }

    /// 전역 장애 시뮬레이션
    pub fn set_outage(&self, outage: bool) {
        self.outage.store(outage, Ordering::SeqCst);
    }

    pub fn cancel_call_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self, transaction_id: &str) -> Result<(), GatewayError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(GatewayError::Request("pg unreachable".to_string()));
        }
        if self.broken_txs.contains(transaction_id) {
            return Err(GatewayError::Request(format!(
                "pg query failed for {transaction_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn ready(&self, order_code: &str, _amount: i64) -> Result<PgReady, GatewayError> {
        self.ready_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable("")?;
        let n = self.seq.fetch_add(1, Ordering::SeqCst);
        let transaction_id = format!("pg-tx-{n}");
        self.statuses.insert(transaction_id.clone(), PgStatus::Pending);
        Ok(PgReady {
            redirect_url: format!("https://pg.example/redirect/{order_code}/{transaction_id}"),
            transaction_id,
        })
    }

    async fn approve(&self, transaction_id: &str) -> Result<PgApproveResult, GatewayError> {
        self.approve_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(transaction_id)?;
        match self.statuses.get(transaction_id).map(|s| s.clone()) {
            Some(PgStatus::Failed) => Ok(PgApproveResult::Declined {
                reason: "card declined".to_string(),
            }),
            Some(PgStatus::Canceled) => Ok(PgApproveResult::Declined {
                reason: "canceled by payer".to_string(),
            }),
            Some(PgStatus::Approved { approval_id }) => {
                Ok(PgApproveResult::Approved { approval_id })
            }
            _ => {
                let approval_id = format!("appr-{transaction_id}");
                self.statuses.insert(
                    transaction_id.to_string(),
                    PgStatus::Approved {
                        approval_id: approval_id.clone(),
                    },
                );
                Ok(PgApproveResult::Approved { approval_id })
            }
        }
    }

    async fn query_status(&self, transaction_id: &str) -> Result<PgStatus, GatewayError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(transaction_id)?;
        Ok(self
            .statuses
            .get(transaction_id)
            .map(|s| s.clone())
            .unwrap_or(PgStatus::Failed))
    }

    async fn cancel(
        &self,
        transaction_id: &str,
        amount: i64,
        reason: &str,
    ) -> Result<(), GatewayError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable(transaction_id)?;
        tracing::debug!(transaction_id, amount, reason, "Mock PG cancel");
        self.statuses
            .insert(transaction_id.to_string(), PgStatus::Canceled);
        Ok(())
    }
}
