//! Scheduled sweepers
//!
//! Timer-driven batch passes re-deriving the same commands in bulk:
//! no-show reset, delivery auto-complete, monthly warn reset, payment
//! reconciliation. All loops honor the shared cancellation token and the
//! lock-sensitive ones retry contention through `RetryPolicy`.

pub mod auto_complete;
pub mod no_show;
pub mod payment;
pub mod warn_reset;

pub use auto_complete::DeliveryAutoCompleteSweeper;
pub use no_show::{NoShowReport, NoShowSweeper};
pub use payment::PaymentSweeper;
pub use warn_reset::WarnResetSweeper;
