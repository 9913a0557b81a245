//! Payment gateway interface and reconciliation

pub mod gateway;
pub mod mock;
pub mod reconcile;

pub use gateway::{GatewayError, PaymentGateway, PgApproveResult, PgReady, PgStatus};
pub use mock::MockGateway;
pub use reconcile::{PaymentReconciler, SweepReport};
