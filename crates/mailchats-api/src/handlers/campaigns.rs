//! Campaign handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use mailchats_storage::{Campaign, CampaignStatus, NewCampaign, UpdateCampaign};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{parse_body, parse_id, JsonBody};
use crate::auth::AppState;
use crate::error::{bad_request, from_error, not_found, ApiError};

pub(crate) const INVALID_CAMPAIGN_ID: &str = "Invalid campaign ID";

/// Deletion confirmation
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
}

fn check_status(status: Option<&str>) -> Result<(), ApiError> {
    match status {
        Some(s) if s.parse::<CampaignStatus>().is_err() => {
            Err(bad_request(format!("Invalid campaign status: {}", s)))
        }
        _ => Ok(()),
    }
}

/// GET /api/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = state
        .storage
        .list_campaigns()
        .await
        .map_err(|e| from_error(e, "Failed to fetch campaigns"))?;

    Ok(Json(campaigns))
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>, ApiError> {
    let id = parse_id(&id, INVALID_CAMPAIGN_ID)?;

    let campaign = state
        .storage
        .get_campaign(id)
        .await
        .map_err(|e| from_error(e, "Failed to fetch campaign"))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    Ok(Json(campaign))
}

/// POST /api/campaigns
pub async fn create_campaign(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<Value>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    let mut input: NewCampaign = parse_body(body)?;
    if input.name.trim().is_empty() {
        return Err(bad_request("Campaign name is required"));
    }
    check_status(input.status.as_deref())?;
    input
        .status
        .get_or_insert_with(|| CampaignStatus::Draft.to_string());

    let campaign = state
        .storage
        .create_campaign(input)
        .await
        .map_err(|e| from_error(e, "Failed to create campaign"))?;

    info!(campaign_id = campaign.id, name = %campaign.name, "Campaign created");
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// PATCH /api/campaigns/:id
pub async fn update_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<Campaign>, ApiError> {
    let id = parse_id(&id, INVALID_CAMPAIGN_ID)?;
    let update: UpdateCampaign = parse_body(body)?;
    check_status(update.status.as_deref())?;

    let campaign = state
        .storage
        .update_campaign(id, update)
        .await
        .map_err(|e| from_error(e, "Failed to update campaign"))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    Ok(Json(campaign))
}

/// DELETE /api/campaigns/:id
pub async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = parse_id(&id, INVALID_CAMPAIGN_ID)?;

    state
        .storage
        .delete_campaign(id)
        .await
        .map_err(|e| from_error(e, "Failed to delete campaign"))?
        .ok_or_else(|| not_found("Campaign not found"))?;

    info!(campaign_id = id, "Campaign deleted");
    Ok(Json(DeletedResponse {
        message: "Campaign deleted successfully".to_string(),
    }))
}
