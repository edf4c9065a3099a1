//! [apps/control-plane/src/kernel.rs]
//! Composition root: opens the store, restores the pending-proposal cache
//! so a restart observes the same pending list as before, wires every
//! component once, then launches the scheduler daemon and the HTTP+WS
//! server on one port. The ignite/launch split keeps "build the state" and
//! "start serving" independently testable.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use nyx_infra_store::{AuditRepository, BookingRepository, ClientRepository, CorrectionRepository, StoreClient, TransactionRepository};
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::ports::erp::FileErpPort;
use crate::ports::llm_backend::StubLlmBackend;
use crate::routes::build_router;
use crate::services::scheduler::register_default_jobs;
use crate::services::{AccessControl, LedgerService, LlmQueue, NotificationFabric, Overseer, ProposalPipeline, Scheduler, SessionManager};
use crate::state::AppState;

pub struct ControlPlaneKernel {
    config: Arc<Config>,
    state: AppState,
}

impl ControlPlaneKernel {
    #[instrument(skip(config))]
    pub async fn ignite(config: Config) -> Self {
        let config = Arc::new(config);

        let store = StoreClient::connect(&config.db_path)
            .await
            .expect("FATAL: could not open the persistent store, ignition aborted");

        let booking_repo = BookingRepository::new(store.pool.clone());
        let audit_repo = AuditRepository::new(store.pool.clone());
        let correction_repo = CorrectionRepository::new(store.pool.clone());
        let client_repo = ClientRepository::new(store.pool.clone());
        let tx_repo = TransactionRepository::new(store.pool.clone());

        let ledger = LedgerService::new(tx_repo).await.expect("FATAL: could not load the ledger's chain state");

        let proposals = ProposalPipeline::new(booking_repo, audit_repo.clone(), correction_repo.clone());
        let restored = proposals.restore().await.expect("FATAL: could not restore pending proposals from the store");
        info!("♻️ [KERNEL]: restored {restored} pending proposals");

        // This binary serves chat and the rest of the API on one listener
        // (config.port); the LLM backend itself is a separate external
        // process. `llm_backend_port` here is only used to keep
        // `AccessControl`'s per-port policy symmetric — it is not a port
        // this binary binds.
        let access_control = AccessControl::new(config.api_port, config.api_port.saturating_add(1), Vec::new());

        let state = AppState {
            config: config.clone(),
            client_repo,
            audit_repo,
            correction_repo,
            ledger: Arc::new(ledger),
            proposals: Arc::new(proposals),
            sessions: Arc::new(SessionManager::new(config.max_sessions)),
            access_control: Arc::new(access_control),
            notifications: Arc::new(NotificationFabric::new()),
            llm_queue: Arc::new(LlmQueue::new(config.llm_max_concurrent, config.llm_rate_per_min, config.llm_timeout_s, config.queue_max)),
            overseer: Arc::new(Overseer::new()),
            scheduler: Arc::new(Scheduler::new()),
            erp_port: Arc::new(FileErpPort::new("data/erp_exports")),
            llm_backend: Arc::new(StubLlmBackend),
        };

        register_default_jobs(
            &state.scheduler,
            Arc::new(state.correction_repo.clone()),
            store.pool.clone(),
            PathBuf::from("data/dpo_datasets"),
            PathBuf::from("data/backups"),
            PathBuf::from("data/logs"),
        )
        .await;

        Self { config, state }
    }

    /// Spawns the scheduler daemon and binds the HTTP+WS server — JSON and
    /// WebSocket share one port.
    pub async fn launch(self) {
        let scheduler = self.state.scheduler.clone();
        tokio::spawn(async move { scheduler.run_forever().await });

        let address = SocketAddr::new(
            self.config.host.parse::<IpAddr>().unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            self.config.port,
        );
        let router = build_router(self.state);

        info!("🚀 [KERNEL_ONLINE]: control plane listening at {address}");

        let listener = match tokio::net::TcpListener::bind(address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("💀 [KERNEL_COLLAPSE]: failed to bind the API port: {e}");
                std::process::exit(1);
            }
        };

        if let Err(e) = axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await {
            error!("💀 [KERNEL_COLLAPSE]: server loop failed: {e}");
            std::process::exit(1);
        }
    }
}
