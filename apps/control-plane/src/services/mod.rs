//! [apps/control-plane/src/services/mod.rs]
//! One file per concurrency primitive or domain
//! engine, each independently testable, composed once in `AppState`.

pub mod access_control;
pub mod chat_router;
pub mod document_pipeline;
pub mod ledger;
pub mod llm_queue;
pub mod notification_fabric;
pub mod overseer;
pub mod proposal_pipeline;
pub mod scheduler;
pub mod session_manager;

pub use access_control::{AccessControl, AccessDecision};
pub use chat_router::{route_chat, ChatRoute};
pub use ledger::LedgerService;
pub use llm_queue::{LlmPermit, LlmQueue};
pub use notification_fabric::NotificationFabric;
pub use overseer::{BookingValidation, BookingWarning, Evaluation, Overseer};
pub use proposal_pipeline::{CorrectionInput, ProposalPipeline};
pub use scheduler::Scheduler;
pub use session_manager::SessionManager;
