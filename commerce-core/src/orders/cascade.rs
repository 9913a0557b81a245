//! Cross-aggregate cascade handler
//!
//! Paying a delivery order flips its linked PENDING reservations to PICKED;
//! canceling or failing it flips PICKED ones back to PENDING (never to
//! CANCELED — the link is reversible, distinct from a reservation's own
//! cancel path). Runs inside the delivery order's unit of work: the caller
//! holds the delivery row lock and every linked reservation's lock.

use crate::core::clock::Clock;
use crate::core::error::CoreResult;
use crate::orders::lifecycle::reservation_table;
use crate::store::MemStore;
use shared::order::{ReservationEvent, ReservationStatus};

pub struct ReservationCascade<'a> {
    store: &'a MemStore,
    clock: &'a dyn Clock,
}

impl<'a> ReservationCascade<'a> {
    pub fn new(store: &'a MemStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    /// 결제 캐스케이드 — PENDING 예약만 PICKED로 전환, 나머지는 건드리지 않음
    pub fn on_delivery_paid(&self, reservation_ids: &[i64]) -> CoreResult<usize> {
        let table = reservation_table();
        let repo = self.store.reservations();
        let now = self.clock.now_millis();
        let mut flipped = 0;
        for &id in reservation_ids {
            let reservation = repo.find_by_id(id)?;
            if reservation.status != ReservationStatus::Pending {
                continue;
            }
            let next = table.apply(reservation.status, ReservationEvent::Pick)?;
            repo.update_with(id, |r| {
                r.status = next;
                r.picked_at = Some(now);
            })?;
            flipped += 1;
        }
        Ok(flipped)
    }

    /// 취소/실패 캐스케이드 — PICKED 예약을 PENDING으로 되돌림
    pub fn on_delivery_reverted(&self, reservation_ids: &[i64]) -> CoreResult<usize> {
        let table = reservation_table();
        let repo = self.store.reservations();
        let mut flipped = 0;
        for &id in reservation_ids {
            let reservation = repo.find_by_id(id)?;
            if reservation.status != ReservationStatus::Picked {
                continue;
            }
            let next = table.apply(reservation.status, ReservationEvent::Release)?;
            repo.update_with(id, |r| {
                r.status = next;
                r.picked_at = None;
            })?;
            flipped += 1;
        }
        Ok(flipped)
    }
}
