//! [apps/control-plane/src/handlers/bookings.rs]
//! `GET /api/pending`, `POST /api/bookings`, and the approve/reject/correct
//! transitions. Every approval runs the overseer's soft validation first
//! and turns any warning into a notification — warnings never block the
//! commit.

use std::collections::BTreeMap;

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};
use chrono::Utc;
use nyx_domain_models::ledger::BookingProposal;
use nyx_domain_models::notification::{Notification, NotificationPriority, NotificationTarget};
use nyx_domain_models::NyxError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::AuthedUser;
use crate::services::CorrectionInput;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub client: Option<String>,
}

pub async fn list_pending(State(state): State<AppState>, Query(query): Query<PendingQuery>) -> Json<Vec<BookingProposal>> {
    Json(state.proposals.list_pending(query.client.as_deref()).await)
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: String,
}

pub async fn submit(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(proposal): Json<BookingProposal>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let id = state.proposals.submit(proposal, &user.user_id).await?;
    Ok(Json(SubmitResponse { id }))
}

pub async fn approve(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<String>,
) -> Result<Json<BookingProposal>, ApiError> {
    let proposal = state.proposals.approve(&id, &user.user_id).await?;

    let validation = state.overseer.validate_booking(&proposal);
    for warning in &validation.warnings {
        let mut data = BTreeMap::new();
        data.insert("booking_id".to_string(), proposal.id.clone());
        state
            .notifications
            .publish(
                NotificationTarget::User(user.user_id.clone()),
                Notification {
                    id: Uuid::new_v4().to_string(),
                    notification_type: "booking_warning".to_string(),
                    title: "Booking validation warning".to_string(),
                    message: warning.message.clone(),
                    module: Some(proposal.doc_type.clone()),
                    data,
                    priority: NotificationPriority::Normal,
                    read: false,
                    timestamp: Utc::now(),
                },
            )
            .await;
    }

    state.ledger.commit(&proposal, &user.user_id).await?;
    state.sessions.record_booking(&user.session_id, true).await;

    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

pub async fn reject(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<BookingProposal>, ApiError> {
    let proposal = state.proposals.reject(&id, &user.user_id, &body.reason).await?;
    state.sessions.record_booking(&user.session_id, false).await;
    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
pub struct CorrectRequest {
    pub original_konto: String,
    pub corrected_konto: String,
    pub supplier: String,
}

pub async fn correct(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<String>,
    Json(body): Json<CorrectRequest>,
) -> Result<Json<BookingProposal>, ApiError> {
    if body.original_konto.trim().is_empty() || body.corrected_konto.trim().is_empty() {
        return Err(NyxError::InvalidInput("original_konto and corrected_konto must not be empty".to_string()).into());
    }

    let correction = CorrectionInput {
        original_konto: body.original_konto,
        corrected_konto: body.corrected_konto,
        supplier: body.supplier,
    };
    let proposal = state.proposals.correct(&id, &user.user_id, correction).await?;
    Ok(Json(proposal))
}
