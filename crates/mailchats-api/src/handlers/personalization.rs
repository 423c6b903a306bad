//! Personalization variable handlers

use axum::Json;
use chrono::Local;
use mailchats_core::merge::{
    apply_enhanced_merge, documentation_html, parse_recipient_line, variable_catalog,
    RecipientVars, VariableDoc,
};
use serde::{Deserialize, Serialize};

use super::JsonBody;
use crate::error::{bad_request, ApiError};

#[derive(Debug, Serialize)]
pub struct DocumentationResponse {
    pub success: bool,
    pub documentation: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseRecipientRequest {
    #[serde(default)]
    pub recipient_line: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ParseRecipientResponse {
    pub success: bool,
    pub variables: RecipientVars,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    #[serde(default)]
    pub template: String,
    #[serde(default)]
    pub recipient_line: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MergeResponse {
    pub success: bool,
    pub result: String,
}

/// GET /api/email/personalization-variables
pub async fn variables() -> Json<&'static [VariableDoc]> {
    Json(variable_catalog())
}

/// GET /api/email/personalization-documentation
pub async fn documentation() -> Json<DocumentationResponse> {
    Json(DocumentationResponse {
        success: true,
        documentation: documentation_html(),
    })
}

/// POST /api/email/parse-recipient
pub async fn parse_recipient(
    JsonBody(req): JsonBody<ParseRecipientRequest>,
) -> Result<Json<ParseRecipientResponse>, ApiError> {
    if req.recipient_line.trim().is_empty() {
        return Err(bad_request("Recipient line is required"));
    }

    Ok(Json(ParseRecipientResponse {
        success: true,
        variables: parse_recipient_line(&req.recipient_line, Local::now()),
    }))
}

/// POST /api/email/apply-enhanced-merge
pub async fn apply_merge(
    JsonBody(req): JsonBody<MergeRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
    if req.template.is_empty() || req.recipient_line.trim().is_empty() {
        return Err(bad_request("Template and recipient line are required"));
    }

    let vars = parse_recipient_line(&req.recipient_line, Local::now());
    Ok(Json(MergeResponse {
        success: true,
        result: apply_enhanced_merge(&req.template, &vars),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{message, TestApp};
    use axum::http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_catalog_and_documentation() {
        let app = TestApp::new().await;

        let vars: Vec<Value> = app
            .server
            .get("/api/email/personalization-variables")
            .await
            .json();
        assert_eq!(vars.len(), 16);
        assert_eq!(vars[0]["name"], "email");

        let docs: Value = app
            .server
            .get("/api/email/personalization-documentation")
            .await
            .json();
        assert_eq!(docs["success"], true);
        assert!(docs["documentation"]
            .as_str()
            .unwrap()
            .contains("Advanced Recipient Format"));
    }

    #[tokio::test]
    async fn test_parse_recipient() {
        let app = TestApp::new().await;

        let response = app
            .server
            .post("/api/email/parse-recipient")
            .json(&json!({"recipientLine": "john.smith@acme.io|Plan = Gold"}))
            .await;
        response.assert_status_ok();
        let body: ParseRecipientResponse = response.json();
        assert_eq!(body.variables["firstname"], "John");
        assert_eq!(body.variables["lastname"], "Smith");
        assert_eq!(body.variables["plan"], "Gold");

        let response = app
            .server
            .post("/api/email/parse-recipient")
            .json(&json!({}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(message(&response.json()), "Recipient line is required");
    }

    #[tokio::test]
    async fn test_apply_merge() {
        let app = TestApp::new().await;

        let body: MergeResponse = app
            .server
            .post("/api/email/apply-enhanced-merge")
            .json(&json!({
                "template": "Dear {{FirstName}} of {company}, {missing}ok",
                "recipientLine": "john.smith@acme.io"
            }))
            .await
            .json();
        assert_eq!(body.result, "Dear John of Acme, ok");

        let response = app
            .server
            .post("/api/email/apply-enhanced-merge")
            .json(&json!({"template": "Hi"}))
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message(&response.json()),
            "Template and recipient line are required"
        );
    }
}
