//! Payment reconcile sweep loop
//!
//! Thin interval wrapper around `PaymentReconciler::sweep_pending` (the
//! batch body lives with the reconciler; this owns only the scheduling).

use crate::core::config::CoreConfig;
use crate::payment::PaymentReconciler;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct PaymentSweeper {
    reconciler: Arc<PaymentReconciler>,
    config: CoreConfig,
}

impl PaymentSweeper {
    pub fn new(reconciler: Arc<PaymentReconciler>, config: CoreConfig) -> Self {
        Self { reconciler, config }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Payment sweeper started");
        let interval = std::time::Duration::from_millis(self.config.payment_sweep_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Payment sweeper stopped");
                    return;
                }
            }
            self.reconciler.sweep_pending().await;
        }
    }
}
