//! In-process row store
//!
//! Row tables plus the display-code indexes and the append-only point
//! ledger. The store itself never validates domain state — services hold the
//! row locks (`RowLockManager`) and re-validate before every mutation; no
//! code path writes `stock` or `status` without going through them.

pub mod locks;
pub mod repository;

pub use locks::{LockKey, RowLockManager};

use dashmap::DashMap;
use parking_lot::RwLock;
use shared::models::{
    CourierClaim, CourierOrder, CourierOrderItem, DeliveryOrder, PointTransaction, Product,
    Reservation, User,
};

use repository::{
    ClaimRepository, CourierRepository, DeliveryRepository, PointRepository, ProductRepository,
    ReservationRepository, UserRepository,
};

/// 행 저장소
pub struct MemStore {
    pub(crate) products: DashMap<i64, Product>,
    pub(crate) users: DashMap<i64, User>,
    pub(crate) reservations: DashMap<i64, Reservation>,
    pub(crate) deliveries: DashMap<i64, DeliveryOrder>,
    pub(crate) couriers: DashMap<i64, CourierOrder>,
    pub(crate) courier_items: DashMap<i64, CourierOrderItem>,
    pub(crate) claims: DashMap<i64, CourierClaim>,
    /// append-only 포인트 원장
    pub(crate) point_txs: RwLock<Vec<PointTransaction>>,
    // display code → row id (충돌 검사용 인덱스)
    pub(crate) reservation_codes: DashMap<String, i64>,
    pub(crate) delivery_codes: DashMap<String, i64>,
    pub(crate) courier_codes: DashMap<String, i64>,
}

impl MemStore {
    pub fn new() -> Self {
        Self {
            products: DashMap::new(),
            users: DashMap::new(),
            reservations: DashMap::new(),
            deliveries: DashMap::new(),
            couriers: DashMap::new(),
            courier_items: DashMap::new(),
            claims: DashMap::new(),
            point_txs: RwLock::new(Vec::new()),
            reservation_codes: DashMap::new(),
            delivery_codes: DashMap::new(),
            courier_codes: DashMap::new(),
        }
    }

    pub fn products(&self) -> ProductRepository<'_> {
        ProductRepository::new(self)
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(self)
    }

    pub fn reservations(&self) -> ReservationRepository<'_> {
        ReservationRepository::new(self)
    }

    pub fn deliveries(&self) -> DeliveryRepository<'_> {
        DeliveryRepository::new(self)
    }

    pub fn couriers(&self) -> CourierRepository<'_> {
        CourierRepository::new(self)
    }

    pub fn claims(&self) -> ClaimRepository<'_> {
        ClaimRepository::new(self)
    }

    pub fn points(&self) -> PointRepository<'_> {
        PointRepository::new(self)
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStore")
            .field("products", &self.products.len())
            .field("users", &self.users.len())
            .field("reservations", &self.reservations.len())
            .field("deliveries", &self.deliveries.len())
            .field("couriers", &self.couriers.len())
            .field("claims", &self.claims.len())
            .finish()
    }
}
