//! Delivery auto-complete sweep
//!
//! Marks OUT_FOR_DELIVERY orders whose accepted timestamp is older than the
//! SLA as DELIVERED. Reservation statuses are untouched — they were already
//! flipped at payment time.

use crate::core::clock::Clock;
use crate::core::config::CoreConfig;
use crate::orders::DeliveryService;
use crate::store::MemStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct DeliveryAutoCompleteSweeper {
    store: Arc<MemStore>,
    deliveries: Arc<DeliveryService>,
    clock: Arc<dyn Clock>,
    config: CoreConfig,
}

impl DeliveryAutoCompleteSweeper {
    pub fn new(
        store: Arc<MemStore>,
        deliveries: Arc<DeliveryService>,
        clock: Arc<dyn Clock>,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            deliveries,
            clock,
            config,
        }
    }

    /// 주기 루프
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!("Delivery auto-complete sweeper started");
        let interval = std::time::Duration::from_millis(self.config.delivery_sweep_interval_ms);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.cancelled() => {
                    tracing::info!("Delivery auto-complete sweeper stopped");
                    return;
                }
            }
            self.run_once().await;
        }
    }

    /// 스위프 1회 — (완료 처리 건수, 실패 건수)
    pub async fn run_once(&self) -> (usize, usize) {
        let cutoff = self.clock.now_millis() - self.config.delivery_sla_ms;
        let stale = self
            .store
            .deliveries()
            .find_out_for_delivery_accepted_before(cutoff);

        let mut completed = 0;
        let mut errors = 0;
        for order in stale {
            match self.deliveries.mark_delivered(order.id).await {
                Ok(_) => {
                    tracing::info!(order_id = order.id, "Delivery auto-completed past SLA");
                    completed += 1;
                }
                Err(e) => {
                    // 경합으로 상태가 바뀐 주문은 다음 스위프에서 자연히 빠진다
                    tracing::warn!(order_id = order.id, error = %e, "Auto-complete failed");
                    errors += 1;
                }
            }
        }
        (completed, errors)
    }
}
