//! Product Repository

use super::{RepoError, RepoResult};
use crate::store::MemStore;
use shared::models::{Product, ProductCreate, ProductUpdate};
use shared::util::{now_millis, snowflake_id};

pub struct ProductRepository<'a> {
    store: &'a MemStore,
}

impl<'a> ProductRepository<'a> {
    pub(crate) fn new(store: &'a MemStore) -> Self {
        Self { store }
    }

    /// Create a new product
    pub fn create(&self, data: ProductCreate) -> Product {
        let now = now_millis();
        let product = Product {
            id: snowflake_id(),
            name: data.name,
            price: data.price,
            stock: data.stock,
            total_sold: 0,
            is_visible: data.is_visible,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        self.store.products.insert(product.id, product.clone());
        product
    }

    pub fn find_by_id(&self, id: i64) -> RepoResult<Product> {
        self.store
            .products
            .get(&id)
            .map(|p| p.clone())
            .ok_or_else(|| RepoError::not_found("product", id))
    }

    /// Find all visible, non-deleted products
    pub fn find_all_visible(&self) -> Vec<Product> {
        self.store
            .products
            .iter()
            .filter(|p| p.is_orderable())
            .map(|p| p.clone())
            .collect()
    }

    /// Apply a mutation under the caller-held product row lock
    pub fn update_with(
        &self,
        id: i64,
        mutate: impl FnOnce(&mut Product),
    ) -> RepoResult<Product> {
        let mut entry = self
            .store
            .products
            .get_mut(&id)
            .ok_or_else(|| RepoError::not_found("product", id))?;
        mutate(entry.value_mut());
        entry.updated_at = now_millis();
        Ok(entry.clone())
    }

    pub fn update(&self, id: i64, data: ProductUpdate) -> RepoResult<Product> {
        self.update_with(id, |p| {
            if let Some(name) = data.name {
                p.name = name;
            }
            if let Some(price) = data.price {
                p.price = price;
            }
            if let Some(visible) = data.is_visible {
                p.is_visible = visible;
            }
        })
    }

    /// Soft delete — rows are never physically removed
    pub fn soft_delete(&self, id: i64) -> RepoResult<Product> {
        self.update_with(id, |p| {
            p.is_deleted = true;
            p.is_visible = false;
        })
    }
}
