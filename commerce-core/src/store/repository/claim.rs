//! Courier Claim Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::CourierClaim;

pub struct ClaimRepository<'a> {
    store: &'a MemStore,
}

impl<'a> ClaimRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    pub fn insert(&self, claim: CourierClaim) -> CourierClaim {
        self.store.claims.insert(claim.id, claim.clone());
        claim
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<CourierClaim> {
        self.store
            .claims
            .get(&id)
            .map(|c| c.clone())
            .ok_or_else(|| RepoError::not_found("claim", id))
    }

    pub fn find_by_order(&self, order_id: i64) -> Vec<CourierClaim> {
        let mut rows: Vec<CourierClaim> = self
            .store
            .claims
            .iter()
            .filter(|c| c.order_id == order_id)
            .map(|c| c.clone())
            .collect();
        rows.sort_by_key(|c| std::cmp::Reverse(c.created_at));
        rows
    }

    /// Apply a mutation under the caller-held claim row lock
    pub fn update_with(
        &self,
        id: i64,
        mutate: impl FnOnce(&mut CourierClaim),
    ) -> RepoResult<CourierClaim> {
        let mut entry = self
            .store
            .claims
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("claim", id))?;
        mutate(entry.value_mut());
        Ok(entry.clone())
    }
}
