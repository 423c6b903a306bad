//! Session, license and verification code handlers

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use mailchats_common::Error;
use mailchats_storage::{NewUser, User};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::JsonBody;
use crate::auth::{
    current_user, hash_password, removal_cookie, session_cookie, verify_password, AppState,
};
use crate::error::{bad_request, from_error, unauthorized, ApiError};

/// Login / registration request
#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl UserResponse {
    fn new(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            created_at: None,
        }
    }
}

/// `{success, message}` body used by the license and verification endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct OutcomeResponse {
    pub success: bool,
    pub message: String,
}

fn outcome(
    status: StatusCode,
    success: bool,
    message: impl Into<String>,
) -> (StatusCode, Json<OutcomeResponse>) {
    (
        status,
        Json(OutcomeResponse {
            success,
            message: message.into(),
        }),
    )
}

/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<(StatusCode, CookieJar, Json<UserResponse>), ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(bad_request("Username and password are required"));
    }

    let existing = state
        .storage
        .get_user_by_username(&req.username)
        .await
        .map_err(|e| from_error(e, "Registration failed"))?;
    if existing.is_some() {
        return Err(bad_request("Username already exists"));
    }

    let password = hash_password(&req.password).map_err(|e| from_error(e, "Registration failed"))?;
    let user = state
        .storage
        .create_user(NewUser {
            username: req.username,
            password,
        })
        .await
        .map_err(|e| match e {
            Error::Conflict(_) => bad_request("Username already exists"),
            e => from_error(e, "Registration failed"),
        })?;

    info!(user_id = user.id, username = %user.username, "User registered");
    let token = state.sessions.create(user.id).await;

    let mut body = UserResponse::new(&user);
    body.created_at = Some(user.created_at);
    Ok((StatusCode::CREATED, jar.add(session_cookie(token)), Json(body)))
}

/// POST /api/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    JsonBody(req): JsonBody<Credentials>,
) -> Result<(CookieJar, Json<UserResponse>), ApiError> {
    let user = state
        .storage
        .get_user_by_username(&req.username)
        .await
        .map_err(|e| from_error(e, "Login failed"))?
        .filter(|user| verify_password(&req.password, &user.password))
        .ok_or_else(|| unauthorized("Invalid username or password"))?;

    info!(user_id = user.id, "User logged in");
    let token = state.sessions.create(user.id).await;
    Ok((jar.add(session_cookie(token)), Json(UserResponse::new(&user))))
}

/// POST /api/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Json<serde_json::Value>) {
    if let Some(user) = current_user(&state, &headers, &jar).await {
        state.sessions.remove(&user.token).await;
        info!(user_id = user.user_id, "User logged out");
    }
    (
        jar.remove(removal_cookie()),
        Json(serde_json::json!({ "message": "Logged out successfully" })),
    )
}

/// GET /api/user
pub async fn current(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<Json<UserResponse>, ApiError> {
    let session = current_user(&state, &headers, &jar)
        .await
        .ok_or_else(|| unauthorized("Not authenticated"))?;

    let user = state
        .storage
        .get_user(session.user_id)
        .await
        .map_err(|e| from_error(e, "Failed to load user"))?
        .ok_or_else(|| unauthorized("Not authenticated"))?;

    Ok(Json(UserResponse::new(&user)))
}

#[derive(Debug, Deserialize)]
pub struct LicenseRequest {
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/license
pub async fn license(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LicenseRequest>,
) -> (StatusCode, Json<OutcomeResponse>) {
    let result = state.license.verify(&req.password).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNAUTHORIZED
    };
    outcome(status, result.success, result.message)
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(default)]
    pub email: String,
}

/// POST /api/auth/send-verification-code
pub async fn send_verification_code(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<SendCodeRequest>,
) -> (StatusCode, Json<OutcomeResponse>) {
    match state.verification.send_code(req.email.trim()).await {
        Ok(()) => outcome(StatusCode::OK, true, "Verification code sent successfully"),
        Err(Error::Validation(message)) => outcome(StatusCode::BAD_REQUEST, false, message),
        Err(e) => {
            error!("Error sending verification code: {}", e);
            outcome(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "Failed to send verification code",
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub code: String,
}

/// POST /api/auth/verify-code
pub async fn verify_code(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<VerifyCodeRequest>,
) -> (StatusCode, Json<OutcomeResponse>) {
    match state
        .verification
        .verify(req.email.trim(), req.code.trim())
        .await
    {
        Ok(()) => outcome(StatusCode::OK, true, "Verification successful"),
        Err(Error::Validation(message)) => outcome(StatusCode::BAD_REQUEST, false, message),
        Err(e) => {
            error!("Error verifying code: {}", e);
            outcome(
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
                "An error occurred while verifying the code",
            )
        }
    }
}
