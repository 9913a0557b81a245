//! Generic order lifecycle engine
//!
//! One pure, dependency-free transition table instantiated three times
//! (reservation / delivery / courier) instead of per-family copy-paste.
//! `apply` is the single gate every status change goes through: a (state,
//! event) pair outside the table is rejected with a message naming the
//! allowed source states, and the caller's row is left untouched.

use crate::core::error::{CoreError, CoreResult};
use shared::order::{
    CourierEvent, CourierStatus, DeliveryEvent, DeliveryStatus, ReservationEvent, ReservationStatus,
};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::LazyLock;

/// 상태 enum 공통 인터페이스 (사용자 노출 라벨)
pub trait StateLabel: Copy + Eq + Hash + fmt::Debug + 'static {
    fn label(&self) -> &'static str;
}

/// 이벤트 enum 공통 인터페이스
pub trait EventLabel: Copy + Eq + Hash + fmt::Debug + 'static {
    fn label(&self) -> &'static str;
}

impl StateLabel for ReservationStatus {
    fn label(&self) -> &'static str {
        ReservationStatus::label(self)
    }
}
impl StateLabel for DeliveryStatus {
    fn label(&self) -> &'static str {
        DeliveryStatus::label(self)
    }
}
impl StateLabel for CourierStatus {
    fn label(&self) -> &'static str {
        CourierStatus::label(self)
    }
}
impl EventLabel for ReservationEvent {
    fn label(&self) -> &'static str {
        ReservationEvent::label(self)
    }
}
impl EventLabel for DeliveryEvent {
    fn label(&self) -> &'static str {
        DeliveryEvent::label(self)
    }
}
impl EventLabel for CourierEvent {
    fn label(&self) -> &'static str {
        CourierEvent::label(self)
    }
}

/// 받침 유무에 따른 주격 조사 선택 ("발송 처리는" / "배달 수락은")
fn topic_particle(word: &str) -> &'static str {
    match word.chars().last() {
        Some(c) if ('가'..='힣').contains(&c) => {
            let offset = c as u32 - 0xAC00;
            if offset % 28 == 0 { "는" } else { "은" }
        }
        _ => "은(는)",
    }
}

/// 전이 테이블 — (현재 상태, 이벤트) → 다음 상태
pub struct TransitionTable<S, E> {
    edges: HashMap<(S, E), S>,
    /// 이벤트별 허용 출발 상태 (등록 순서 유지 — 오류 메시지 안정성)
    sources: HashMap<E, Vec<S>>,
}

impl<S: StateLabel, E: EventLabel> TransitionTable<S, E> {
    pub fn builder() -> TransitionTableBuilder<S, E> {
        TransitionTableBuilder {
            edges: HashMap::new(),
            sources: HashMap::new(),
        }
    }

    /// 전이 적용 — 테이블에 없는 조합은 허용 상태를 명시한 도메인 오류
    pub fn apply(&self, current: S, event: E) -> CoreResult<S> {
        if let Some(next) = self.edges.get(&(current, event)) {
            return Ok(*next);
        }
        let message = match self.sources.get(&event) {
            Some(allowed) if !allowed.is_empty() => {
                let states = allowed
                    .iter()
                    .map(|s| s.label())
                    .collect::<Vec<_>>()
                    .join(" 또는 ");
                format!(
                    "{}{} {} 상태에서만 가능합니다",
                    event.label(),
                    topic_particle(event.label()),
                    states
                )
            }
            _ => format!("{}{} 허용되지 않는 처리입니다", event.label(), topic_particle(event.label())),
        };
        Err(CoreError::Domain(message))
    }

    /// (state, event) 조합이 테이블에 존재하는지
    pub fn allows(&self, current: S, event: E) -> bool {
        self.edges.contains_key(&(current, event))
    }
}

pub struct TransitionTableBuilder<S, E> {
    edges: HashMap<(S, E), S>,
    sources: HashMap<E, Vec<S>>,
}

impl<S: StateLabel, E: EventLabel> TransitionTableBuilder<S, E> {
    pub fn edge(mut self, from: S, event: E, to: S) -> Self {
        self.edges.insert((from, event), to);
        self.sources.entry(event).or_default().push(from);
        self
    }

    pub fn build(self) -> TransitionTable<S, E> {
        TransitionTable {
            edges: self.edges,
            sources: self.sources,
        }
    }
}

// ============================================================================
// Family tables
// ============================================================================

/// 예약: PENDING → PICKED → (배달 취소 캐스케이드로 PENDING 복귀), PENDING → CANCELED
pub fn reservation_table() -> &'static TransitionTable<ReservationStatus, ReservationEvent> {
    static TABLE: LazyLock<TransitionTable<ReservationStatus, ReservationEvent>> =
        LazyLock::new(|| {
            TransitionTable::builder()
                .edge(
                    ReservationStatus::Pending,
                    ReservationEvent::Pick,
                    ReservationStatus::Picked,
                )
                .edge(
                    ReservationStatus::Picked,
                    ReservationEvent::Release,
                    ReservationStatus::Pending,
                )
                .edge(
                    ReservationStatus::Pending,
                    ReservationEvent::Cancel,
                    ReservationStatus::Canceled,
                )
                .build()
        });
    &*TABLE
}

/// 배달 주문: 결제대기 → 결제완료 → 배달중 → 배달완료, 취소/실패 종결
pub fn delivery_table() -> &'static TransitionTable<DeliveryStatus, DeliveryEvent> {
    static TABLE: LazyLock<TransitionTable<DeliveryStatus, DeliveryEvent>> = LazyLock::new(|| {
        TransitionTable::builder()
            .edge(
                DeliveryStatus::PendingPayment,
                DeliveryEvent::Pay,
                DeliveryStatus::Paid,
            )
            .edge(
                DeliveryStatus::Paid,
                DeliveryEvent::Accept,
                DeliveryStatus::OutForDelivery,
            )
            .edge(
                DeliveryStatus::OutForDelivery,
                DeliveryEvent::Deliver,
                DeliveryStatus::Delivered,
            )
            .edge(
                DeliveryStatus::PendingPayment,
                DeliveryEvent::Cancel,
                DeliveryStatus::Canceled,
            )
            .edge(
                DeliveryStatus::Paid,
                DeliveryEvent::Cancel,
                DeliveryStatus::Canceled,
            )
            .edge(
                DeliveryStatus::PendingPayment,
                DeliveryEvent::Fail,
                DeliveryStatus::Failed,
            )
            .build()
    });
    &*TABLE
}

/// 택배 주문 — 가장 완전한 그래프
///
/// PAID → SHIPPED 는 PREPARING 생략이 명시적으로 허용된 유일한 건너뜀이다.
/// PAID → DELIVERED / PAID → IN_TRANSIT 직행, 종결 상태 이탈은 모두 거부.
pub fn courier_table() -> &'static TransitionTable<CourierStatus, CourierEvent> {
    static TABLE: LazyLock<TransitionTable<CourierStatus, CourierEvent>> = LazyLock::new(|| {
        TransitionTable::builder()
            .edge(
                CourierStatus::PendingPayment,
                CourierEvent::Pay,
                CourierStatus::Paid,
            )
            .edge(
                CourierStatus::Paid,
                CourierEvent::Prepare,
                CourierStatus::Preparing,
            )
            .edge(CourierStatus::Paid, CourierEvent::Ship, CourierStatus::Shipped)
            .edge(
                CourierStatus::Preparing,
                CourierEvent::Ship,
                CourierStatus::Shipped,
            )
            .edge(
                CourierStatus::Shipped,
                CourierEvent::Transit,
                CourierStatus::InTransit,
            )
            .edge(
                CourierStatus::Shipped,
                CourierEvent::Deliver,
                CourierStatus::Delivered,
            )
            .edge(
                CourierStatus::InTransit,
                CourierEvent::Deliver,
                CourierStatus::Delivered,
            )
            .edge(
                CourierStatus::PendingPayment,
                CourierEvent::Cancel,
                CourierStatus::Canceled,
            )
            .edge(
                CourierStatus::PendingPayment,
                CourierEvent::Fail,
                CourierStatus::Failed,
            )
            .edge(
                CourierStatus::Paid,
                CourierEvent::AdminCancel,
                CourierStatus::Canceled,
            )
            .edge(
                CourierStatus::Preparing,
                CourierEvent::AdminCancel,
                CourierStatus::Canceled,
            )
            .build()
    });
    &*TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    const COURIER_STATES: [CourierStatus; 8] = [
        CourierStatus::PendingPayment,
        CourierStatus::Paid,
        CourierStatus::Preparing,
        CourierStatus::Shipped,
        CourierStatus::InTransit,
        CourierStatus::Delivered,
        CourierStatus::Canceled,
        CourierStatus::Failed,
    ];
    const COURIER_EVENTS: [CourierEvent; 8] = [
        CourierEvent::Pay,
        CourierEvent::Prepare,
        CourierEvent::Ship,
        CourierEvent::Transit,
        CourierEvent::Deliver,
        CourierEvent::Cancel,
        CourierEvent::AdminCancel,
        CourierEvent::Fail,
    ];

    #[test]
    fn courier_happy_path() {
        let table = courier_table();
        let mut status = CourierStatus::PendingPayment;
        for event in [
            CourierEvent::Pay,
            CourierEvent::Prepare,
            CourierEvent::Ship,
            CourierEvent::Transit,
            CourierEvent::Deliver,
        ] {
            status = table.apply(status, event).unwrap();
        }
        assert_eq!(status, CourierStatus::Delivered);
    }

    #[test]
    fn paid_may_ship_directly_skipping_preparing() {
        let table = courier_table();
        assert_eq!(
            table.apply(CourierStatus::Paid, CourierEvent::Ship).unwrap(),
            CourierStatus::Shipped
        );
    }

    #[test]
    fn illegal_courier_edges_are_rejected() {
        let table = courier_table();
        // 결제 전 직행 금지
        for event in [CourierEvent::Prepare, CourierEvent::Ship, CourierEvent::Deliver] {
            assert!(table.apply(CourierStatus::PendingPayment, event).is_err());
        }
        // PAID → DELIVERED / IN_TRANSIT 직행 금지
        assert!(table.apply(CourierStatus::Paid, CourierEvent::Deliver).is_err());
        assert!(table.apply(CourierStatus::Paid, CourierEvent::Transit).is_err());
        // 종결 상태 이탈 금지
        for terminal in [
            CourierStatus::Delivered,
            CourierStatus::Canceled,
            CourierStatus::Failed,
        ] {
            for event in COURIER_EVENTS {
                assert!(table.apply(terminal, event).is_err());
            }
        }
    }

    #[test]
    fn rejection_message_names_allowed_states() {
        let table = courier_table();
        let err = table
            .apply(CourierStatus::PendingPayment, CourierEvent::Ship)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "발송 처리는 결제완료 또는 준비중 상태에서만 가능합니다"
        );
    }

    #[test]
    fn transition_completeness_every_pair_decides() {
        // 테이블에 없는 (상태, 이벤트) 조합은 전부 도메인 오류
        let table = courier_table();
        let mut allowed = 0;
        for state in COURIER_STATES {
            for event in COURIER_EVENTS {
                match table.apply(state, event) {
                    Ok(_) => {
                        allowed += 1;
                        assert!(table.allows(state, event));
                    }
                    Err(CoreError::Domain(_)) => assert!(!table.allows(state, event)),
                    Err(other) => panic!("unexpected error class: {other:?}"),
                }
            }
        }
        // 명세 그래프의 간선 수
        assert_eq!(allowed, 11);
    }

    #[test]
    fn reservation_link_is_reversible() {
        let table = reservation_table();
        let picked = table
            .apply(ReservationStatus::Pending, ReservationEvent::Pick)
            .unwrap();
        let back = table.apply(picked, ReservationEvent::Release).unwrap();
        assert_eq!(back, ReservationStatus::Pending);
        // 취소된 예약은 어떤 이벤트도 받지 않는다
        for event in [
            ReservationEvent::Pick,
            ReservationEvent::Release,
            ReservationEvent::Cancel,
        ] {
            assert!(table.apply(ReservationStatus::Canceled, event).is_err());
        }
    }

    #[test]
    fn delivery_cancel_allowed_until_out_for_delivery() {
        let table = delivery_table();
        assert!(table
            .apply(DeliveryStatus::PendingPayment, DeliveryEvent::Cancel)
            .is_ok());
        assert!(table.apply(DeliveryStatus::Paid, DeliveryEvent::Cancel).is_ok());
        assert!(table
            .apply(DeliveryStatus::OutForDelivery, DeliveryEvent::Cancel)
            .is_err());
        assert!(table
            .apply(DeliveryStatus::Delivered, DeliveryEvent::Cancel)
            .is_err());
    }

    #[test]
    fn topic_particle_follows_final_consonant() {
        assert_eq!(topic_particle("발송 처리"), "는");
        assert_eq!(topic_particle("배달 수락"), "은");
    }
}
