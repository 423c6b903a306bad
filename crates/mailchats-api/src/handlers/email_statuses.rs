//! Per-recipient email status handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mailchats_storage::{EmailStatus, NewEmailStatus, UpdateEmailStatus};
use serde_json::Value;
use std::sync::Arc;

use super::campaigns::{DeletedResponse, INVALID_CAMPAIGN_ID};
use super::{parse_body, parse_id, JsonBody};
use crate::auth::AppState;
use crate::error::{bad_request, from_error, not_found, ApiError};

const INVALID_EMAIL_STATUS_ID: &str = "Invalid email status ID";

/// GET /api/campaigns/:campaign_id/emails
pub async fn list_email_statuses(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Vec<EmailStatus>>, ApiError> {
    let campaign_id = parse_id(&campaign_id, INVALID_CAMPAIGN_ID)?;

    let statuses = state
        .storage
        .list_email_statuses(campaign_id)
        .await
        .map_err(|e| from_error(e, "Failed to fetch email statuses"))?;

    Ok(Json(statuses))
}

/// POST /api/campaigns/:campaign_id/emails
pub async fn create_email_status(
    State(state): State<Arc<AppState>>,
    Path(campaign_id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<EmailStatus>), ApiError> {
    let campaign_id = parse_id(&campaign_id, INVALID_CAMPAIGN_ID)?;

    state
        .storage
        .get_campaign(campaign_id)
        .await
        .map_err(|e| from_error(e, "Failed to create email status"))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    let mut input: NewEmailStatus = parse_body(body)?;
    if input.email.trim().is_empty() {
        return Err(bad_request("Email is required"));
    }
    input.campaign_id = campaign_id;

    let status = state
        .storage
        .create_email_status(input)
        .await
        .map_err(|e| from_error(e, "Failed to create email status"))?;

    Ok((StatusCode::CREATED, Json(status)))
}

/// GET /api/emails/:id
pub async fn get_email_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<EmailStatus>, ApiError> {
    let id = parse_id(&id, INVALID_EMAIL_STATUS_ID)?;

    let status = state
        .storage
        .get_email_status(id)
        .await
        .map_err(|e| from_error(e, "Failed to fetch email status"))?
        .ok_or_else(|| not_found("Email status not found"))?;

    Ok(Json(status))
}

/// PATCH /api/emails/:id
pub async fn update_email_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<EmailStatus>, ApiError> {
    let id = parse_id(&id, INVALID_EMAIL_STATUS_ID)?;
    let update: UpdateEmailStatus = parse_body(body)?;

    let status = state
        .storage
        .update_email_status(id, update)
        .await
        .map_err(|e| from_error(e, "Failed to update email status"))?
        .ok_or_else(|| not_found("Email status not found"))?;

    Ok(Json(status))
}

/// DELETE /api/emails/:id
pub async fn delete_email_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_id(&id, INVALID_EMAIL_STATUS_ID)?;

    state
        .storage
        .delete_email_status(id)
        .await
        .map_err(|e| from_error(e, "Failed to delete email status"))?
        .ok_or_else(|| not_found("Email status not found"))?;

    Ok(Json(DeletedResponse {
        message: "Email status deleted successfully".to_string(),
    }))
}
