//! [apps/control-plane/src/state.rs]
//! The one `AppState` value every handler shares, so components are wired
//! once at startup instead of living as module-level singletons. Cheap to
//! clone: every field is an `Arc`, a pooled handle, or a repository wrapping
//! one.

use std::sync::Arc;

use nyx_infra_store::{AuditRepository, ClientRepository, CorrectionRepository};

use crate::config::Config;
use crate::ports::erp::ErpPort;
use crate::ports::llm_backend::LlmBackend;
use crate::services::{AccessControl, LedgerService, LlmQueue, NotificationFabric, Overseer, ProposalPipeline, Scheduler, SessionManager};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client_repo: ClientRepository,
    pub audit_repo: AuditRepository,
    pub correction_repo: CorrectionRepository,
    pub ledger: Arc<LedgerService>,
    pub proposals: Arc<ProposalPipeline>,
    pub sessions: Arc<SessionManager>,
    pub access_control: Arc<AccessControl>,
    pub notifications: Arc<NotificationFabric>,
    pub llm_queue: Arc<LlmQueue>,
    pub overseer: Arc<Overseer>,
    pub scheduler: Arc<Scheduler>,
    pub erp_port: Arc<dyn ErpPort>,
    pub llm_backend: Arc<dyn LlmBackend>,
}
