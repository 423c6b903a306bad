//! Theme handlers

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use super::JsonBody;
use crate::auth::AppState;
use crate::error::{from_error, ApiError};

#[derive(Debug, Serialize)]
pub struct ThemeUpdated {
    pub message: String,
}

/// GET /api/theme
pub async fn get_theme(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let theme = state
        .theme
        .get()
        .await
        .map_err(|e| from_error(e, "Failed to read theme"))?;
    Ok(Json(theme))
}

/// POST /api/theme
pub async fn update_theme(
    State(state): State<Arc<AppState>>,
    JsonBody(body): JsonBody<Value>,
) -> Result<Json<ThemeUpdated>, ApiError> {
    state
        .theme
        .update(body)
        .await
        .map_err(|e| from_error(e, "Failed to update theme"))?;

    Ok(Json(ThemeUpdated {
        message: "Theme updated successfully".to_string(),
    }))
}
