//! 재고·주문 생명주기 동시성 코어
//!
//! Pre-order/pickup + courier-delivery commerce backend core: finite daily
//! stock under concurrent demand with a strict no-oversell guarantee, three
//! causally linked order state machines, an append-only point ledger, and
//! idempotent reconciliation of at-least-once PG events.
//!
//! # 모듈 구조
//!
//! ```text
//! commerce-core/src/
//! ├── core/       # 설정, 오류 분류, 시계, 재시도, 백그라운드 태스크, 상태 조립
//! ├── store/      # 행 저장소, 행 잠금, 리포지토리
//! ├── stock/      # 재고 예약 엔진 (no-oversell)
//! ├── points/     # 포인트 원장
//! ├── orders/     # 예약/배달/택배 상태 기계 + 캐스케이드
//! ├── claims/     # 클레임 서브 상태 기계
//! ├── payment/    # PG 인터페이스 + 정산
//! ├── sweepers/   # 정기 스위프 (노쇼, 자동완료, 경고 리셋, 결제 정산)
//! └── waybill.rs  # 운송장 일괄 등록 (all-or-nothing)
//! ```
//!
//! # 동시성 모델
//!
//! 명령 하나 = 잠금 → 재검증 → 전이 → 부수효과 → 해제의 단일 작업 단위.
//! `Product.stock`과 각 주문의 `status`는 행 잠금 없이는 절대 쓰이지 않는다.
//! 잠금 획득 실패는 재시도 가능한 오류 클래스로 분리되어 스케줄러만 자동
//! 재시도한다.

pub mod claims;
pub mod core;
pub mod external;
pub mod orders;
pub mod payment;
pub mod points;
pub mod stock;
pub mod store;
pub mod sweepers;
pub mod waybill;

// Re-export 공용 타입
pub use crate::core::{
    BackgroundTasks, Clock, CoreConfig, CoreError, CoreResult, CoreState, FixedClock, RetryPolicy,
    SystemClock, TaskKind,
};
pub use claims::{ClaimAction, ClaimCreate, ClaimDecision, ClaimService};
pub use external::{ArtifactStore, NoopArtifactStore};
pub use orders::{CourierService, DeliveryService, DomainEvent, EventBus, ReservationService};
pub use payment::{MockGateway, PaymentGateway, PaymentReconciler, PgStatus, SweepReport};
pub use points::{BulkEarnTarget, PointService};
pub use stock::StockEngine;
pub use store::{LockKey, MemStore, RowLockManager};
pub use waybill::{WaybillImportError, WaybillImporter, WaybillRow, WaybillRowError};
