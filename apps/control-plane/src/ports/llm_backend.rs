//! [apps/control-plane/src/ports/llm_backend.rs]
//! The local model server behind the LLM backend port is an external
//! process, called out by name in access control's per-port policy.
//! `LlmBackend` is the seam the chat handlers call through once
//! `services::llm_queue` grants a dispatch slot; `StubLlmBackend` returns a
//! deterministic accounting-flavoured reply so the control plane runs
//! without a model attached.

use std::future::Future;
use std::pin::Pin;

use nyx_domain_models::NyxError;
use tracing::instrument;

#[derive(Debug, Clone)]
pub struct GeneratedReply {
    pub text: String,
}

pub trait LlmBackend: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> Pin<Box<dyn Future<Output = Result<GeneratedReply, NyxError>> + Send + 'a>>;
}

pub struct StubLlmBackend;

impl LlmBackend for StubLlmBackend {
    #[instrument(skip(self, prompt))]
    fn generate<'a>(&'a self, prompt: &'a str) -> Pin<Box<dyn Future<Output = Result<GeneratedReply, NyxError>> + Send + 'a>> {
        Box::pin(async move {
            Ok(GeneratedReply {
                text: format!(
                    "Acknowledged: \"{prompt}\". No local model is attached; route this to the matching module for a manual draft."
                ),
            })
        })
    }
}
