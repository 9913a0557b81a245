//! Domain events
//!
//! Committed transitions publish an event after the unit of work completes
//! (broadcast channel fan-out). The reservation cascade
//! consumes `DeliveryPaid`/`DeliveryCanceled` *synchronously inside* the
//! paying/canceling unit of work — the broadcast here is notification only,
//! never a side-effect carrier.

use serde::Serialize;
use tokio::sync::broadcast;

/// 이벤트 채널 용량
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// 커밋된 전이가 발행하는 도메인 이벤트
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "type")]
pub enum DomainEvent {
    ReservationCreated {
        reservation_id: i64,
        user_id: i64,
        product_id: i64,
        quantity: i64,
    },
    ReservationPicked {
        reservation_id: i64,
    },
    ReservationCanceled {
        reservation_id: i64,
        restored_quantity: i64,
    },
    DeliveryPaid {
        order_id: i64,
        reservation_ids: Vec<i64>,
    },
    DeliveryCanceled {
        order_id: i64,
        reservation_ids: Vec<i64>,
    },
    DeliveryFailed {
        order_id: i64,
    },
    DeliveryDelivered {
        order_id: i64,
    },
    CourierPaid {
        order_id: i64,
    },
    CourierShipped {
        order_id: i64,
        waybill_no: String,
    },
    CourierDelivered {
        order_id: i64,
    },
    CourierCanceled {
        order_id: i64,
    },
    CourierFailed {
        order_id: i64,
    },
    ClaimRequested {
        claim_id: i64,
        order_id: i64,
    },
    ClaimDecided {
        claim_id: i64,
        approved: bool,
    },
}

/// 이벤트 브로드캐스트 버스
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// 커밋 이후 호출 — 수신자가 없으면 조용히 버린다
    pub fn publish(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No active event receivers");
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(DomainEvent::CourierPaid { order_id: 42 });
        match rx.recv().await.unwrap() {
            DomainEvent::CourierPaid { order_id } => assert_eq!(order_id, 42),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.publish(DomainEvent::DeliveryDelivered { order_id: 1 });
    }
}
