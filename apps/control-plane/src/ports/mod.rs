//! [apps/control-plane/src/ports/mod.rs]
//! Seams to the two external collaborators this crate treats as out of
//! scope: the ERP-specific file emitter and the local LLM backend process.
//! Each trait returns a manually boxed future — the same pattern
//! `services::scheduler::JobHandler` uses — so the crate doesn't need to add
//! `async-trait` just for these two call sites.

pub mod erp;
pub mod llm_backend;

pub use erp::{ErpExportRequest, ErpExportResult, ErpPort, FileErpPort};
pub use llm_backend::{GeneratedReply, LlmBackend, StubLlmBackend};
