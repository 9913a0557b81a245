//! 스위프·정산 통합 테스트
//!
//! 배달 결제 캐스케이드, 결제 정산 스위프의 주문별 격리, 노쇼 제한
//! 캐스케이드, 배달 자동완료 SLA를 주입 시계로 검증한다.

use chrono::NaiveDate;
use commerce_core::sweepers::{DeliveryAutoCompleteSweeper, NoShowSweeper, WarnResetSweeper};
use commerce_core::{
    CoreConfig, CoreError, CoreState, FixedClock, MockGateway, NoopArtifactStore, PgStatus,
};
use shared::models::{
    Actor, CourierLineInput, CourierOrderCreate, DeliveryOrderCreate, ProductCreate,
    ReservationCreate, UserCreate,
};
use shared::order::{CourierStatus, DeliveryStatus, ReservationStatus};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
}

struct Harness {
    state: CoreState,
    gateway: Arc<MockGateway>,
    clock: Arc<FixedClock>,
}

fn harness() -> Harness {
    let config = CoreConfig::for_tests();
    let clock = Arc::new(FixedClock::at_noon(today(), config.timezone));
    let (state, gateway) = CoreState::with_mock_gateway(config, clock.clone());
    Harness {
        state,
        gateway,
        clock,
    }
}

fn seed_product(state: &CoreState, stock: Option<i64>) -> i64 {
    state
        .store
        .products()
        .create(ProductCreate {
            name: "치아바타".to_string(),
            price: 6_500,
            stock,
            is_visible: true,
        })
        .id
}

fn seed_user(state: &CoreState, name: &str) -> i64 {
    state
        .store
        .users()
        .create(UserCreate {
            name: name.to_string(),
        })
        .id
}

async fn seed_reservation(state: &CoreState, pid: i64, uid: i64, pickup: NaiveDate) -> i64 {
    state
        .reservations
        .reserve(ReservationCreate {
            user_id: uid,
            product_id: pid,
            quantity: 1,
            pickup_date: pickup,
        })
        .await
        .unwrap()
        .id
}

// ============================================================================
// 배달 결제 캐스케이드
// ============================================================================

#[tokio::test]
async fn delivery_payment_flips_reservations_and_cancel_flips_back() {
    let h = harness();
    let pid = seed_product(&h.state, Some(10));
    let uid = seed_user(&h.state, "배주연");
    let r1 = seed_reservation(&h.state, pid, uid, today()).await;
    let r2 = seed_reservation(&h.state, pid, uid, today()).await;

    let order = h
        .state
        .deliveries
        .ready(DeliveryOrderCreate {
            user_id: uid,
            reservation_ids: vec![r1, r2],
            delivery_fee: 3_000,
            point_to_use: 0,
        })
        .await
        .unwrap();
    assert_eq!(order.status, DeliveryStatus::PendingPayment);
    assert_eq!(order.total_amount, 16_000); // 6500 × 2 + 3000

    // 결제 콜백: 소유자 불일치는 not-found
    let err = h
        .state
        .reconciler
        .confirm_delivery_callback(&order.display_code, uid + 1)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound { .. }));

    let paid = h
        .state
        .reconciler
        .confirm_delivery_callback(&order.display_code, uid)
        .await
        .unwrap();
    assert_eq!(paid.status, DeliveryStatus::Paid);
    assert!(paid.pg_approval_id.is_some());
    for rid in [r1, r2] {
        assert_eq!(
            h.state.store.reservations().find_by_id(rid).unwrap().status,
            ReservationStatus::Picked
        );
    }

    // 중복 콜백은 가드에 걸린다
    let err = h
        .state
        .reconciler
        .confirm_delivery_callback(&order.display_code, uid)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Domain(_)));

    // 취소: PG 환불 1회 + 예약은 PICKED → PENDING 복귀 (취소 아님)
    h.state.deliveries.cancel(order.id, &Actor::Admin(1)).await.unwrap();
    assert_eq!(h.gateway.cancel_call_count(), 1);
    for rid in [r1, r2] {
        assert_eq!(
            h.state.store.reservations().find_by_id(rid).unwrap().status,
            ReservationStatus::Pending
        );
    }
}

// ============================================================================
// 결제 정산 스위프
// ============================================================================

#[tokio::test]
async fn payment_sweep_settles_each_order_independently() {
    let h = harness();
    let pid = seed_product(&h.state, Some(100));

    let mut orders = Vec::new();
    for name in ["가", "나", "다", "라"] {
        let uid = seed_user(&h.state, name);
        let order = h
            .state
            .couriers
            .ready(CourierOrderCreate {
                user_id: uid,
                lines: vec![CourierLineInput {
                    product_id: pid,
                    quantity: 2,
                }],
                shipping_fee: 3_000,
                point_to_use: 0,
            })
            .await
            .unwrap();
        orders.push(order);
    }
    assert_eq!(
        h.state.store.products().find_by_id(pid).unwrap().stock,
        Some(92)
    );

    let tx = |i: usize| orders[i].pg_tx_id.clone().unwrap();
    // 주문별 PG 상태 스크립트: 승인 / 실패 / 진행중 / 조회 장애
    h.gateway.set_status(
        &tx(0),
        PgStatus::Approved {
            approval_id: "appr-sweep-0".to_string(),
        },
    );
    h.gateway.set_status(&tx(1), PgStatus::Failed);
    // orders[2]는 ready 기본값 Pending 유지
    h.gateway.break_tx(&tx(3));

    // 유예 시간(2분) 경과 전에는 스위프 대상이 없다
    let report = h.state.reconciler.sweep_pending().await;
    assert_eq!(report.scanned, 0);

    h.clock.advance(3 * 60 * 1000);
    let report = h.state.reconciler.sweep_pending().await;
    assert_eq!(report.scanned, 4);
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.still_pending, 1);
    assert_eq!(report.errors, 1);

    let status = |i: usize| {
        h.state
            .store
            .couriers()
            .find_by_id(orders[i].id)
            .unwrap()
            .status
    };
    assert_eq!(status(0), CourierStatus::Paid);
    assert_eq!(status(1), CourierStatus::Failed);
    assert_eq!(status(2), CourierStatus::PendingPayment);
    // 조회 장애 주문은 건드리지 않고 다음 스위프로 넘긴다
    assert_eq!(status(3), CourierStatus::PendingPayment);

    // 실패 주문의 재고만 복원되었다 (92 + 2)
    assert_eq!(
        h.state.store.products().find_by_id(pid).unwrap().stock,
        Some(94)
    );

    // 재실행 멱등성: 이미 정산된 주문은 다시 스캔되지 않는다
    let report = h.state.reconciler.sweep_pending().await;
    assert_eq!(report.scanned, 2); // Pending 1 + 장애 1
    assert_eq!(report.confirmed, 0);
}

// ============================================================================
// 노쇼 스위프와 제한 캐스케이드
// ============================================================================

#[tokio::test]
async fn third_no_show_restricts_user_and_cascades_future_cancellations() {
    let h = harness();
    let pid = seed_product(&h.state, Some(10));
    let uid = seed_user(&h.state, "노서현");
    // 이미 경고 2회 누적 상태
    h.state
        .store
        .users()
        .update_with(uid, |u| u.monthly_warn_count = 2)
        .unwrap();

    let overdue = seed_reservation(&h.state, pid, uid, today()).await;
    let future_date = today().succ_opt().unwrap().succ_opt().unwrap(); // 8/8
    let f1 = seed_reservation(&h.state, pid, uid, future_date).await;
    let f2 = seed_reservation(&h.state, pid, uid, future_date).await;
    assert_eq!(
        h.state.store.products().find_by_id(pid).unwrap().stock,
        Some(7)
    );

    // 하루 경과 → 픽업일 지난 예약은 노쇼
    h.clock.advance(24 * 60 * 60 * 1000);
    let sweeper = NoShowSweeper::new(
        Arc::clone(&h.state.store),
        Arc::clone(&h.state.locks),
        Arc::clone(&h.state.reservations),
        h.clock.clone(),
        Arc::new(NoopArtifactStore),
        h.state.config.clone(),
    );
    let report = sweeper.run_once().await;
    assert_eq!(report.canceled, 1);
    assert_eq!(report.restricted_users, 1);
    assert_eq!(report.cascade_canceled, 2);

    // 경고 3회 → 5일 제한 (8/7 + 5일 = 8/12)
    let user = h.state.store.users().find_by_id(uid).unwrap();
    assert_eq!(user.monthly_warn_count, 3);
    assert_eq!(
        user.restricted_until,
        NaiveDate::from_ymd_opt(2026, 8, 12)
    );

    // 당일분 + 미래분 전부 취소, 재고 전량 복원
    for rid in [overdue, f1, f2] {
        assert_eq!(
            h.state.store.reservations().find_by_id(rid).unwrap().status,
            ReservationStatus::Canceled
        );
    }
    assert_eq!(
        h.state.store.products().find_by_id(pid).unwrap().stock,
        Some(10)
    );

    // 제한 중에는 신규 예약 불가
    let err = h
        .state
        .reservations
        .reserve(ReservationCreate {
            user_id: uid,
            product_id: pid,
            quantity: 1,
            pickup_date: future_date,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Domain(_)));

    // 재실행해도 추가 취소는 없다
    let report = sweeper.run_once().await;
    assert_eq!(report.canceled, 0);
}

#[tokio::test]
async fn first_no_show_only_warns() {
    let h = harness();
    let pid = seed_product(&h.state, Some(5));
    let uid = seed_user(&h.state, "조민기");
    seed_reservation(&h.state, pid, uid, today()).await;

    h.clock.advance(24 * 60 * 60 * 1000);
    let sweeper = NoShowSweeper::new(
        Arc::clone(&h.state.store),
        Arc::clone(&h.state.locks),
        Arc::clone(&h.state.reservations),
        h.clock.clone(),
        Arc::new(NoopArtifactStore),
        h.state.config.clone(),
    );
    let report = sweeper.run_once().await;
    assert_eq!(report.canceled, 1);
    assert_eq!(report.restricted_users, 0);

    let user = h.state.store.users().find_by_id(uid).unwrap();
    assert_eq!(user.monthly_warn_count, 1);
    assert_eq!(user.restricted_until, None);
}

// ============================================================================
// 배달 자동완료 + 월간 경고 리셋
// ============================================================================

#[tokio::test]
async fn stale_deliveries_are_auto_completed_past_sla() {
    let h = harness();
    let pid = seed_product(&h.state, Some(10));
    let uid = seed_user(&h.state, "백도윤");
    let rid = seed_reservation(&h.state, pid, uid, today()).await;

    let order = h
        .state
        .deliveries
        .ready(DeliveryOrderCreate {
            user_id: uid,
            reservation_ids: vec![rid],
            delivery_fee: 3_000,
            point_to_use: 0,
        })
        .await
        .unwrap();
    h.state
        .reconciler
        .confirm_delivery_callback(&order.display_code, uid)
        .await
        .unwrap();
    h.state.deliveries.accept(order.id).await.unwrap();

    let sweeper = DeliveryAutoCompleteSweeper::new(
        Arc::clone(&h.state.store),
        Arc::clone(&h.state.deliveries),
        h.clock.clone(),
        h.state.config.clone(),
    );

    // SLA(90분) 이전에는 건드리지 않는다
    h.clock.advance(60 * 60 * 1000);
    assert_eq!(sweeper.run_once().await, (0, 0));

    h.clock.advance(31 * 60 * 1000);
    assert_eq!(sweeper.run_once().await, (1, 0));

    let completed = h.state.store.deliveries().find_by_id(order.id).unwrap();
    assert_eq!(completed.status, DeliveryStatus::Delivered);
    assert!(completed.delivered_at.is_some());
    // 예약 상태는 결제 시점에 이미 PICKED — 자동완료가 건드리지 않는다
    assert_eq!(
        h.state.store.reservations().find_by_id(rid).unwrap().status,
        ReservationStatus::Picked
    );
}

#[tokio::test]
async fn monthly_reset_zeroes_warn_counts() {
    let h = harness();
    let u1 = seed_user(&h.state, "임소혜");
    let u2 = seed_user(&h.state, "류건우");
    for (uid, count) in [(u1, 2), (u2, 5)] {
        h.state
            .store
            .users()
            .update_with(uid, |u| u.monthly_warn_count = count)
            .unwrap();
    }

    let sweeper = WarnResetSweeper::new(
        Arc::clone(&h.state.store),
        Arc::clone(&h.state.locks),
        h.clock.clone(),
        h.state.config.clone(),
    );
    assert_eq!(sweeper.run_once().await.unwrap(), 2);
    for uid in [u1, u2] {
        assert_eq!(
            h.state.store.users().find_by_id(uid).unwrap().monthly_warn_count,
            0
        );
    }
}
