//! User Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::{User, UserCreate};
use shared::util::{now_millis, snowflake_id};

pub struct UserRepository<'a> {
    store: &'a MemStore,
}

impl<'a> UserRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    pub fn create(&self, data: UserCreate) -> User {
        let now = now_millis();
        let user = User {
            id: snowflake_id(),
            name: data.name,
            point_balance: 0,
            monthly_warn_count: 0,
            restricted_until: None,
            created_at: now,
            updated_at: now,
        };
        self.store.users.insert(user.id, user.clone());
        user
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<User> {
        self.store
            .users
            .get(&id)
            .map(|u| u.clone())
            .ok_or_else(|| RepoError::not_found("user", id))
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.store.users.iter().map(|u| u.id).collect()
    }

    /// Apply a mutation under the caller-held user row lock
    pub fn update_with(&self, id: i64, mutate: impl FnOnce(&mut User)) -> RepoResult<User> {
        let mut entry = self
            .store
            .users
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("user", id))?;
        mutate(entry.value_mut());
        entry.updated_at = now_millis();
        Ok(entry.clone())
    }
}
