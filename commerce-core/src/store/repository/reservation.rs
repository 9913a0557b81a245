//! Reservation Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use chrono::NaiveDate;
use shared::models::Reservation;
use shared::order::ReservationStatus;

pub struct ReservationRepository<'a> {
    store: &'a MemStore,
}

impl<'a> ReservationRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    /// Insert a fully-built row (id/display code already assigned).
    /// Fails on display-code collision — callers regenerate and retry.
    pub fn insert(&self, reservation: Reservation) -> RepoResult<Reservation> {
        use dashmap::mapref::entry::Entry;
        match self
            .store
            .reservation_codes
            .entry(reservation.display_code.clone())
        {
            Entry::Occupied(_) => Err(RepoError::DuplicateCode(reservation.display_code)),
            Entry::Vacant(slot) => {
                slot.insert(reservation.id);
                self.store
                    .reservations
                    .insert(reservation.id, reservation.clone());
                Ok(reservation)
            }
        }
    }

    pub fn code_taken(&self, code: &str) -> bool {
        self.store.reservation_codes.contains_key(code)
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<Reservation> {
        self.store
            .reservations
            .get(&id)
            .map(|r| r.clone())
            .ok_or_else(|| RepoError::not_found("reservation", id))
    }

    pub fn find_by_code(&self, code: &str) -> RepoResult<Reservation> {
        let id = self
            .store
            .reservation_codes
            .get(code)
            .map(|e| *e.value())
            .ok_or_else(|| RepoError::not_found("reservation", code))?;
        self.find_by_id(id)
    }

    /// 픽업일이 지났는데 아직 픽업대기인 예약 (노쇼 스위프 대상)
    pub fn find_pending_before(&self, date: NaiveDate) -> Vec<Reservation> {
        self.store
            .reservations
            .iter()
            .filter(|r| r.status == ReservationStatus::Pending && r.pickup_date < date)
            .map(|r| r.clone())
            .collect()
    }

    /// 특정 사용자의 픽업대기 예약 중 픽업일이 date 이후인 것 (제한 캐스케이드 대상)
    pub fn find_pending_by_user_from(&self, user_id: i64, date: NaiveDate) -> Vec<Reservation> {
        self.store
            .reservations
            .iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.status == ReservationStatus::Pending
                    && r.pickup_date >= date
            })
            .map(|r| r.clone())
            .collect()
    }

    pub fn find_by_user(&self, user_id: i64) -> Vec<Reservation> {
        let mut rows: Vec<Reservation> = self
            .store
            .reservations
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
        rows
    }

    /// Apply a mutation under the caller-held reservation row lock
    pub fn update_with(
        &self,
        id: i64,
        mutate: impl FnOnce(&mut Reservation),
    ) -> RepoResult<Reservation> {
        let mut entry = self
            .store
            .reservations
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("reservation", id))?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }
}
