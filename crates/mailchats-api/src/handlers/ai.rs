//! AI subject line and template recommendation handlers

use axum::{extract::State, http::StatusCode, Json};
use mailchats_core::ai::{
    Recommendation, SubjectOptions, SubjectResponse, Suggestion, TemplateAnalysisRequest,
};
use mailchats_core::ProgressEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::JsonBody;
use crate::auth::AppState;
use crate::error::{api_error, bad_request, ApiError};

/// Subject generation request; numbers may arrive as strings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSubjectsRequest {
    #[serde(default)]
    pub email_content: String,
    pub tone: Option<String>,
    pub industry: Option<String>,
    pub target_audience: Option<String>,
    pub max_length: Option<Value>,
    pub count: Option<Value>,
}

/// Leading integer of a JSON number or numeric string
fn loose_int(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

impl GenerateSubjectsRequest {
    fn into_options(self) -> SubjectOptions {
        let mut options = SubjectOptions::new(self.email_content);
        if let Some(tone) = self.tone.filter(|t| !t.is_empty()) {
            options.tone = tone;
        }
        options.industry = self.industry.unwrap_or_default();
        options.target_audience = self.target_audience.unwrap_or_default();
        if let Some(max_length) = loose_int(self.max_length.as_ref()) {
            options.max_length = u32::try_from(max_length).unwrap_or(u32::MAX);
        }
        if let Some(count) = loose_int(self.count.as_ref()) {
            options.count = usize::try_from(count).unwrap_or(usize::MAX);
        }
        options
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    pub success: bool,
    pub suggestions: Vec<Suggestion>,
}

/// POST /api/email/generate-subjects
pub async fn generate_subjects(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<GenerateSubjectsRequest>,
) -> Result<(StatusCode, Json<SubjectResponse>), ApiError> {
    if req.email_content.trim().is_empty() {
        return Err(bad_request("Email content is required"));
    }

    info!("Generating subject lines using DeepSeek AI...");
    state
        .hub
        .publish(ProgressEvent::info("Generating AI subject lines..."));

    let result = state.ai.generate_subjects(&req.into_options()).await;

    if result.success {
        state.hub.publish(ProgressEvent::success(format!(
            "Generated {} subject lines",
            result.subjects.len()
        )));
        Ok((StatusCode::OK, Json(result)))
    } else {
        state.hub.publish(ProgressEvent::error(format!(
            "Failed to generate subject lines: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )));
        Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(result)))
    }
}

fn check_request(state: &AppState, req: &TemplateAnalysisRequest) -> Result<(), ApiError> {
    if req.html_content.trim().is_empty() {
        return Err(bad_request("HTML content is required"));
    }
    if !state.ai.is_configured() {
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "ai_not_configured",
            "DeepSeek API key is not configured",
        ));
    }
    Ok(())
}

/// POST /api/template/analyze
pub async fn analyze_template(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<TemplateAnalysisRequest>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    check_request(&state, &req)?;

    let recommendations = state.ai.analyze_template(&req).await;
    Ok(Json(AnalysisResponse {
        success: true,
        recommendations,
    }))
}

/// POST /api/template/suggestions
pub async fn template_suggestions(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<TemplateAnalysisRequest>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    check_request(&state, &req)?;

    let suggestions = state.ai.suggest_templates(&req).await;
    Ok(Json(SuggestionsResponse {
        success: true,
        suggestions,
    }))
}
