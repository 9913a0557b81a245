//! Shared domain types for the pre-order commerce backend
//!
//! Common types used across crates: entity models, per-family order status
//! and lifecycle-event enums, point ledger types, and utility helpers.

pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Frequently used status vocabulary
pub use order::{
    CourierEvent, CourierStatus, DeliveryEvent, DeliveryStatus, ItemStatus, ReservationEvent,
    ReservationStatus,
};
