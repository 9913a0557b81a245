//! Order lifecycle services
//!
//! Three parallel families over one generic transition engine:
//!
//! - **reservation** — 매장 픽업 예약 (stock held at creation)
//! - **delivery** — 근거리 배달 (bundles reservations; pay/cancel cascades)
//! - **courier** — 택배 주문 (line-item snapshots, waybill, claims attach here)
//!
//! Every committed transition pairs with its stock/point side effect inside
//! one locked unit of work; `events` broadcasts afterwards for observers.

pub mod cascade;
pub mod courier;
pub mod delivery;
pub mod display_code;
pub mod events;
pub mod lifecycle;
pub mod reservation;

pub use courier::CourierService;
pub use delivery::DeliveryService;
pub use events::{DomainEvent, EventBus};
pub use lifecycle::{courier_table, delivery_table, reservation_table, TransitionTable};
pub use reservation::ReservationService;
