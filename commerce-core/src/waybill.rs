//! Bulk waybill import
//!
//! Spreadsheet rows (already parsed by the excluded import layer) are
//! matched to courier orders by display code and shipped in one batch.
//! The batch is all-or-nothing: one row referencing an unknown or
//! already-shipped order aborts everything, and the error reports every
//! offending row with its reason — not just the first.
//!
//! All target order rows are locked up front, so validation and apply see
//! the same state and the batch commits atomically.

use crate::core::error::CoreError;
use crate::orders::lifecycle::courier_table;
use crate::orders::CourierService;
use crate::store::{LockKey, MemStore, RowLockManager};
use serde::Serialize;
use shared::order::CourierEvent;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// 일괄 등록 입력 행
#[derive(Debug, Clone)]
pub struct WaybillRow {
    pub display_code: String,
    pub waybill_no: String,
}

/// 거부된 행과 사유
#[derive(Debug, Clone, Serialize)]
pub struct WaybillRowError {
    /// 1-based 행 번호
    pub row: usize,
    pub display_code: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum WaybillImportError {
    /// 검증 실패 — 모든 위반 행을 담는다
    #[error("운송장 일괄 등록이 거부되었습니다 ({} 건 오류)", .0.len())]
    Rejected(Vec<WaybillRowError>),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub struct WaybillImporter {
    store: Arc<MemStore>,
    locks: Arc<RowLockManager>,
    couriers: Arc<CourierService>,
}

impl WaybillImporter {
    pub fn new(
        store: Arc<MemStore>,
        locks: Arc<RowLockManager>,
        couriers: Arc<CourierService>,
    ) -> Self {
        Self {
            store,
            locks,
            couriers,
        }
    }

    /// 일괄 발송 — 성공 시 발송 처리된 주문 수 반환
    pub async fn import(&self, rows: &[WaybillRow]) -> Result<usize, WaybillImportError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let repo = self.store.couriers();
        let mut offenders: Vec<WaybillRowError> = Vec::new();
        let mut resolved: Vec<(usize, i64, &WaybillRow)> = Vec::new();
        let mut seen_codes: HashMap<&str, usize> = HashMap::new();

        // 1차: 코드 해석 + 배치 내 중복 검출 (잠금 전)
        for (idx, row) in rows.iter().enumerate() {
            let row_no = idx + 1;
            if let Some(first_row) = seen_codes.get(row.display_code.as_str()) {
                offenders.push(WaybillRowError {
                    row: row_no,
                    display_code: row.display_code.clone(),
                    reason: format!("배치 내 중복된 주문 코드입니다 ({first_row}행과 중복)"),
                });
                continue;
            }
            seen_codes.insert(row.display_code.as_str(), row_no);

            match repo.find_by_code(&row.display_code) {
                Ok(order) => resolved.push((row_no, order.id, row)),
                Err(_) => offenders.push(WaybillRowError {
                    row: row_no,
                    display_code: row.display_code.clone(),
                    reason: "존재하지 않는 주문 코드입니다".to_string(),
                }),
            }
        }

        // 대상 주문 전체를 잠근 뒤 같은 상태 위에서 검증과 적용을 수행
        let keys: Vec<LockKey> = resolved.iter().map(|(_, id, _)| LockKey::Courier(*id)).collect();
        let _guards = self.locks.lock_many(keys).await.map_err(WaybillImportError::Core)?;

        // 2차: 잠금 하에서 행별 검증
        for (row_no, order_id, row) in &resolved {
            if let Err(reason) = self.validate_row(*order_id, row) {
                offenders.push(WaybillRowError {
                    row: *row_no,
                    display_code: row.display_code.clone(),
                    reason,
                });
            }
        }

        if !offenders.is_empty() {
            offenders.sort_by_key(|o| o.row);
            tracing::warn!(
                total = rows.len(),
                rejected = offenders.len(),
                "Waybill import rejected"
            );
            return Err(WaybillImportError::Rejected(offenders));
        }

        // 3차: 전량 적용 — 검증을 통과했고 잠금을 쥐고 있으므로 실패하지 않는다
        let mut shipped = 0;
        for (_, order_id, row) in &resolved {
            self.couriers
                .ship_locked(*order_id, &row.waybill_no)
                .map_err(WaybillImportError::Core)?;
            shipped += 1;
        }

        tracing::info!(shipped, "Waybill import committed");
        Ok(shipped)
    }

    /// 행 검증 — 실패 시 사유 문자열
    fn validate_row(&self, order_id: i64, row: &WaybillRow) -> Result<(), String> {
        if row.waybill_no.trim().is_empty() {
            return Err("운송장 번호가 비어 있습니다".to_string());
        }
        let order = self
            .store
            .couriers()
            .find_by_id(order_id)
            .map_err(|e| CoreError::from(e).to_string())?;
        if order.waybill_no.is_some() {
            return Err("이미 운송장이 등록된 주문입니다".to_string());
        }
        if !courier_table().allows(order.status, CourierEvent::Ship) {
            return Err(format!(
                "발송 가능한 상태가 아닙니다 (현재: {})",
                order.status.label()
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::{Clock, FixedClock};
    use crate::core::config::CoreConfig;
    use crate::orders::EventBus;
    use crate::payment::MockGateway;
    use crate::points::PointService;
    use crate::stock::StockEngine;
    use shared::models::{CourierLineInput, CourierOrderCreate, ProductCreate, UserCreate};
    use shared::order::CourierStatus;
    use std::time::Duration;

    struct Fixture {
        importer: WaybillImporter,
        couriers: Arc<CourierService>,
        store: Arc<MemStore>,
    }

    fn fixture() -> Fixture {
        let config = CoreConfig::for_tests();
        let store = Arc::new(MemStore::new());
        let locks = Arc::new(RowLockManager::new(Duration::from_millis(500)));
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_noon(
            chrono::NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            config.timezone,
        ));
        let stock = Arc::new(StockEngine::new(Arc::clone(&store), Arc::clone(&locks)));
        let points = Arc::new(PointService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&clock),
        ));
        let couriers = Arc::new(CourierService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            stock,
            points,
            Arc::new(MockGateway::new()),
            clock,
            Arc::new(EventBus::new()),
            config,
        ));
        let importer = WaybillImporter::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&couriers),
        );
        Fixture {
            importer,
            couriers,
            store,
        }
    }

    /// 결제완료 상태의 주문을 만든다
    async fn seed_paid_order(fx: &Fixture) -> String {
        let product = fx.store.products().create(ProductCreate {
            name: "쿠키 상자".to_string(),
            price: 9_000,
            stock: None,
            is_visible: true,
        });
        let user = fx.store.users().create(UserCreate {
            name: "최다인".to_string(),
        });
        let order = fx
            .couriers
            .ready(CourierOrderCreate {
                user_id: user.id,
                lines: vec![CourierLineInput {
                    product_id: product.id,
                    quantity: 1,
                }],
                shipping_fee: 3_000,
                point_to_use: 0,
            })
            .await
            .unwrap();
        fx.couriers.confirm_payment(order.id, None).await.unwrap();
        order.display_code
    }

    #[tokio::test]
    async fn clean_batch_ships_everything() {
        let fx = fixture();
        let code_a = seed_paid_order(&fx).await;
        let code_b = seed_paid_order(&fx).await;

        let rows = vec![
            WaybillRow {
                display_code: code_a.clone(),
                waybill_no: "WB-0001".to_string(),
            },
            WaybillRow {
                display_code: code_b.clone(),
                waybill_no: "WB-0002".to_string(),
            },
        ];
        let shipped = fx.importer.import(&rows).await.unwrap();
        assert_eq!(shipped, 2);

        let order = fx.store.couriers().find_by_code(&code_a).unwrap();
        assert_eq!(order.status, CourierStatus::Shipped);
        assert_eq!(order.waybill_no.as_deref(), Some("WB-0001"));
    }

    #[tokio::test]
    async fn one_bad_row_aborts_the_whole_batch() {
        let fx = fixture();
        let good = seed_paid_order(&fx).await;

        let rows = vec![
            WaybillRow {
                display_code: good.clone(),
                waybill_no: "WB-1000".to_string(),
            },
            WaybillRow {
                display_code: "C260806-NOPE".to_string(),
                waybill_no: "WB-1001".to_string(),
            },
        ];
        let err = fx.importer.import(&rows).await.unwrap_err();
        match err {
            WaybillImportError::Rejected(offenders) => {
                assert_eq!(offenders.len(), 1);
                assert_eq!(offenders[0].row, 2);
                assert!(offenders[0].reason.contains("존재하지 않는"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        // 정상 행도 적용되지 않았다
        let order = fx.store.couriers().find_by_code(&good).unwrap();
        assert_eq!(order.status, CourierStatus::Paid);
        assert!(order.waybill_no.is_none());
    }

    #[tokio::test]
    async fn every_offending_row_is_reported() {
        let fx = fixture();
        let good = seed_paid_order(&fx).await;
        let shipped_code = seed_paid_order(&fx).await;
        // 미리 발송해 둔 주문은 재발송 불가 행이 된다
        let shipped_order = fx.store.couriers().find_by_code(&shipped_code).unwrap();
        fx.couriers.ship(shipped_order.id, "WB-PRE").await.unwrap();

        let rows = vec![
            WaybillRow {
                display_code: good,
                waybill_no: "  ".to_string(), // 공백 운송장
            },
            WaybillRow {
                display_code: shipped_code,
                waybill_no: "WB-2001".to_string(),
            },
            WaybillRow {
                display_code: "C260806-ZZZZ".to_string(),
                waybill_no: "WB-2002".to_string(),
            },
        ];
        let err = fx.importer.import(&rows).await.unwrap_err();
        match err {
            WaybillImportError::Rejected(offenders) => {
                assert_eq!(offenders.len(), 3);
                assert_eq!(
                    offenders.iter().map(|o| o.row).collect::<Vec<_>>(),
                    vec![1, 2, 3]
                );
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
