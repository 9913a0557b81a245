//! 주문 동시성 스트레스 테스트
//!
//! 명세의 동시성 속성을 서비스 전체 경로로 검증한다:
//! no-oversell, exactly-one-cancel, 중복 결제 웹훅 멱등성.

use chrono::NaiveDate;
use commerce_core::{CoreConfig, CoreError, CoreState, FixedClock, LockKey};
use shared::models::{Actor, CourierLineInput, CourierOrderCreate, ProductCreate, ReservationCreate, UserCreate};
use shared::order::{CourierStatus, ReservationStatus};
use std::sync::Arc;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 6).unwrap()
}

fn state() -> CoreState {
    let config = CoreConfig::for_tests();
    let clock = Arc::new(FixedClock::at_noon(today(), config.timezone));
    let (state, _gateway) = CoreState::with_mock_gateway(config, clock);
    state
}

fn seed_product(state: &CoreState, stock: Option<i64>) -> i64 {
    state
        .store
        .products()
        .create(ProductCreate {
            name: "앙버터".to_string(),
            price: 4_500,
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

#[tokio::test]
async fn no_oversell_under_concurrent_reservations() {
    // 재고 10, 동시 예약 5건 × 3개 → 정확히 3건 성공, 최종 재고 1
    let state = Arc::new(state());
    let pid = seed_product(&state, Some(10));
    let users: Vec<i64> = (0..5)
        .map(|i| seed_user(&state, &format!("손님{i}")))
        .collect();

    let mut handles = Vec::new();
    for uid in users {
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            state
                .reservations
                .reserve(ReservationCreate {
                    user_id: uid,
                    product_id: pid,
                    quantity: 3,
                    pickup_date: today(),
                })
                .await
                .is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 3);
    let product = state.store.products().find_by_id(pid).unwrap();
    assert_eq!(product.stock, Some(1));
    assert_eq!(product.total_sold, 9);
}

#[tokio::test]
async fn exactly_one_of_concurrent_cancels_wins() {
    let state = Arc::new(state());
    let pid = seed_product(&state, Some(10));
    let uid = seed_user(&state, "김한결");

    let reservation = state
        .reservations
        .reserve(ReservationCreate {
            user_id: uid,
            product_id: pid,
            quantity: 4,
            pickup_date: today(),
        })
        .await
        .unwrap();
    assert_eq!(
        state.store.products().find_by_id(pid).unwrap().stock,
        Some(6)
    );

    // 동시 취소 8건 → 정확히 1건 성공, 나머지는 도메인 오류
    let mut handles = Vec::new();
    for _ in 0..8 {
        let state = Arc::clone(&state);
        let rid = reservation.id;
        handles.push(tokio::spawn(async move {
            state.reservations.cancel(rid, &Actor::Admin(1)).await
        }));
    }

    let mut ok = 0;
    let mut domain_errors = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(CoreError::Domain(_)) => domain_errors += 1,
            Err(other) => panic!("unexpected error class: {other:?}"),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(domain_errors, 7);
    // 재고는 정확히 한 번만 복원된다
    assert_eq!(
        state.store.products().find_by_id(pid).unwrap().stock,
        Some(10)
    );
    assert_eq!(
        state
            .store
            .reservations()
            .find_by_id(reservation.id)
            .unwrap()
            .status,
        ReservationStatus::Canceled
    );
}

#[tokio::test]
async fn duplicate_payment_webhooks_confirm_exactly_once() {
    let state = Arc::new(state());
    let pid = seed_product(&state, Some(10));
    let uid = seed_user(&state, "오세린");

    let order = state
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

    // 중복 웹훅 6건 동시 도착
    let mut handles = Vec::new();
    for _ in 0..6 {
        let state = Arc::clone(&state);
        let oid = order.id;
        handles.push(tokio::spawn(async move {
            state.couriers.confirm_payment(oid, Some("appr-dup")).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }

    assert_eq!(ok, 1);
    let confirmed = state.store.couriers().find_by_id(order.id).unwrap();
    assert_eq!(confirmed.status, CourierStatus::Paid);
    // 재고는 생성 시 1회만 차감된 상태 그대로
    assert_eq!(
        state.store.products().find_by_id(pid).unwrap().stock,
        Some(8)
    );
}

#[tokio::test]
async fn lock_timeout_surfaces_as_retryable_error() {
    let state = state();
    let pid = seed_product(&state, Some(10));
    let uid = seed_user(&state, "유태오");

    // 상품 행 잠금을 점유한 채 예약 시도
    let _held = state.locks.lock(LockKey::Product(pid)).await.unwrap();
    let err = state
        .reservations
        .reserve(ReservationCreate {
            user_id: uid,
            product_id: pid,
            quantity: 1,
            pickup_date: today(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::LockTimeout(_)));
    assert!(err.is_retryable());
}
