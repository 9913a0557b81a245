//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity (상품)
///
/// `stock == None` means unlimited stock: the capacity check is skipped in
/// both reserve and restore directions. `stock >= 0` is maintained by the
/// stock engine; nothing else may write it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// 단가 (원)
    pub price: i64,
    /// 당일 판매 재고 수량, None = 무제한
    pub stock: Option<i64>,
    /// 누적 판매 수량
    pub total_sold: i64,
    pub is_visible: bool,
    /// soft delete 플래그 — 물리 삭제 없음
    pub is_deleted: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Product {
    /// 예약 가능 여부 (노출 중이고 삭제되지 않음)
    pub fn is_orderable(&self) -> bool {
        self.is_visible && !self.is_deleted
    }
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    pub price: i64,
    pub stock: Option<i64>,
    pub is_visible: bool,
}

/// Update product payload
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub price: Option<i64>,
    pub is_visible: Option<bool>,
}
