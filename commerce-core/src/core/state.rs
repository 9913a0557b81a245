//! Core state assembly
//!
//! `CoreState` owns one shared instance of every service, wired over the
//! same store, lock manager, clock, gateway, and event bus. Construct once,
//! clone freely (everything is `Arc`-shared), and call `spawn_sweepers` to
//! register the background loops.

use crate::claims::ClaimService;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::CoreConfig;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::external::{ArtifactStore, NoopArtifactStore};
use crate::orders::{CourierService, DeliveryService, EventBus, ReservationService};
use crate::payment::{MockGateway, PaymentGateway, PaymentReconciler};
use crate::points::PointService;
use crate::stock::StockEngine;
use crate::store::{MemStore, RowLockManager};
use crate::sweepers::{
    DeliveryAutoCompleteSweeper, NoShowSweeper, PaymentSweeper, WarnResetSweeper,
};
use crate::waybill::WaybillImporter;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct CoreState {
    pub config: CoreConfig,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<MemStore>,
    pub locks: Arc<RowLockManager>,
    pub events: Arc<EventBus>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub stock: Arc<StockEngine>,
    pub points: Arc<PointService>,
    pub reservations: Arc<ReservationService>,
    pub deliveries: Arc<DeliveryService>,
    pub couriers: Arc<CourierService>,
    pub claims: Arc<ClaimService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub waybills: Arc<WaybillImporter>,
}

impl CoreState {
    /// 전체 서비스 조립
    pub fn new(
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        gateway: Arc<dyn PaymentGateway>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        let store = Arc::new(MemStore::new());
        let locks = Arc::new(RowLockManager::new(Duration::from_millis(
            config.lock_timeout_ms,
        )));
        let events = Arc::new(EventBus::new());

        let stock = Arc::new(StockEngine::new(Arc::clone(&store), Arc::clone(&locks)));
        let points = Arc::new(PointService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&clock),
        ));
        let reservations = Arc::new(ReservationService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&stock),
            Arc::clone(&clock),
            Arc::clone(&events),
            config.clone(),
        ));
        let deliveries = Arc::new(DeliveryService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&points),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            Arc::clone(&events),
            config.clone(),
        ));
        let couriers = Arc::new(CourierService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&stock),
            Arc::clone(&points),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            Arc::clone(&events),
            config.clone(),
        ));
        let claims = Arc::new(ClaimService::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&points),
            Arc::clone(&gateway),
            Arc::clone(&clock),
            Arc::clone(&events),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            Arc::clone(&deliveries),
            Arc::clone(&couriers),
            Arc::clone(&clock),
            config.clone(),
        ));
        let waybills = Arc::new(WaybillImporter::new(
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&couriers),
        ));

        Self {
            config,
            clock,
            store,
            locks,
            events,
            gateway,
            artifacts,
            stock,
            points,
            reservations,
            deliveries,
            couriers,
            claims,
            reconciler,
            waybills,
        }
    }

    /// 운영 기본값: 시스템 시계 + no-op 아티팩트 저장소
    pub fn with_gateway(config: CoreConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self::new(
            config,
            Arc::new(SystemClock),
            gateway,
            Arc::new(NoopArtifactStore),
        )
    }

    /// 테스트/로컬용: 목 게이트웨이를 함께 돌려준다
    pub fn with_mock_gateway(config: CoreConfig, clock: Arc<dyn Clock>) -> (Self, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::new());
        let state = Self::new(
            config,
            clock,
            gateway.clone(),
            Arc::new(NoopArtifactStore),
        );
        (state, gateway)
    }

    /// 스위퍼 4종을 백그라운드 태스크로 등록
    pub fn spawn_sweepers(&self, tasks: &mut BackgroundTasks) {
        let shutdown = tasks.shutdown_token();

        let no_show = NoShowSweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.locks),
            Arc::clone(&self.reservations),
            Arc::clone(&self.clock),
            Arc::clone(&self.artifacts),
            self.config.clone(),
        );
        tasks.spawn("no_show_sweeper", TaskKind::Periodic, {
            let token = shutdown.clone();
            async move { no_show.run(token).await }
        });

        let auto_complete = DeliveryAutoCompleteSweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.deliveries),
            Arc::clone(&self.clock),
            self.config.clone(),
        );
        tasks.spawn("delivery_auto_complete", TaskKind::Periodic, {
            let token = shutdown.clone();
            async move { auto_complete.run(token).await }
        });

        let warn_reset = WarnResetSweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.locks),
            Arc::clone(&self.clock),
            self.config.clone(),
        );
        tasks.spawn("warn_reset_sweeper", TaskKind::Periodic, {
            let token = shutdown.clone();
            async move { warn_reset.run(token).await }
        });

        let payment = PaymentSweeper::new(Arc::clone(&self.reconciler), self.config.clone());
        tasks.spawn("payment_sweeper", TaskKind::Periodic, {
            let token = shutdown;
            async move { payment.run(token).await }
        });

        tracing::info!(count = tasks.len(), "Sweepers registered");
    }
}

impl std::fmt::Debug for CoreState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreState")
            .field("config", &self.config)
            .field("store", &self.store)
            .finish()
    }
}
