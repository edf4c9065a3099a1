//! [apps/control-plane/src/handlers/monitor.rs]
//! `GET /api/monitor`: the `get_stats()`-style counters every component
//! already exposes, gathered into one snapshot.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::services::llm_queue::QueueCounters;
use crate::services::scheduler::JobStats;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MonitorResponse {
    pub live_sessions: usize,
    pub llm_queue: QueueCounters,
    pub llm_active: usize,
    pub llm_queue_depth: usize,
    pub overseer_evaluations: u64,
    pub overseer_blocks: u64,
    pub scheduler_jobs: Vec<JobStats>,
    pub ledger_chain_ok: bool,
}

pub async fn monitor(State(state): State<AppState>) -> Result<Json<MonitorResponse>, ApiError> {
    let (evaluations, blocks) = state.overseer.stats();
    let ledger_chain_ok = state.ledger.verify_chain().await?.is_ok();

    Ok(Json(MonitorResponse {
        live_sessions: state.sessions.live_count().await,
        llm_queue: state.llm_queue.counters().await,
        llm_active: state.llm_queue.active().await,
        llm_queue_depth: state.llm_queue.queue_depth().await,
        overseer_evaluations: evaluations,
        overseer_blocks: blocks,
        scheduler_jobs: state.scheduler.stats().await,
        ledger_chain_ok,
    }))
}
