//! Authentication module
//!
//! Server-side sessions keyed by an opaque token. The token travels in the
//! `mailchats.sid` cookie or as an `Authorization: Bearer` header.

use argon2::password_hash::{rand_core::OsRng, PasswordHasher, SaltString};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Duration, Utc};
use mailchats_common::{types::UserId, Config, Error, Result};
use mailchats_core::{
    CampaignEngine, DeepSeekClient, LicenseVerifier, ProgressHub, ThemeStore, VerificationService,
};
use mailchats_storage::Storage;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{unauthorized, ApiError};

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "mailchats.sid";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Storage>,
    pub hub: ProgressHub,
    pub engine: Arc<CampaignEngine>,
    pub ai: Arc<DeepSeekClient>,
    pub verification: Arc<VerificationService>,
    pub theme: Arc<ThemeStore>,
    pub license: Arc<LicenseVerifier>,
    pub sessions: SessionStore,
}

#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// In-memory session store
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Start a session and return its token, dropping any expired sessions
    pub async fn create(&self, user_id: UserId) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let now = Utc::now();
        let session = Session {
            user_id,
            expires_at: now + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "Expired sessions removed");
        }
        sessions.insert(token.clone(), session);
        debug!(user_id, "Session created");
        token
    }

    /// Resolve a token, dropping it if expired
    pub async fn get(&self, token: &str) -> Option<UserId> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get(token)?.clone();
        if session.expires_at <= Utc::now() {
            sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }
}

/// The authenticated user, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
    pub token: String,
}

/// Hash a password with Argon2
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against a stored Argon2 hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .ok()
        .and_then(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .ok()
        })
        .is_some()
}

/// Extract the session token from the Authorization header or the cookie
pub fn extract_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    jar.get(SESSION_COOKIE).map(|c| c.value().to_string())
}

/// Resolve the current user, if any
pub async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
    jar: &CookieJar,
) -> Option<AuthUser> {
    let token = extract_token(headers, jar)?;
    let user_id = state.sessions.get(&token).await?;
    Some(AuthUser { user_id, token })
}

/// Session cookie for `token`
pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

/// Cookie that clears the session
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    let user = current_user(&state, request.headers(), &jar)
        .await
        .ok_or_else(|| {
            warn!("Unauthenticated request to {}", request.uri().path());
            unauthorized("Authentication required")
        })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_password_hashing() {
        let hash = hash_password("hunter22").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("hunter22", "not-a-hash"));
    }

    #[test]
    fn test_extract_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        let jar = CookieJar::new().add(session_cookie("from-cookie".into()));
        assert_eq!(extract_token(&headers, &jar).as_deref(), Some("from-cookie"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(extract_token(&headers, &jar).as_deref(), Some("from-header"));

        assert_eq!(extract_token(&HeaderMap::new(), &CookieJar::new()), None);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::new(Duration::hours(1));
        let token = store.create(7).await;
        assert_eq!(store.get(&token).await, Some(7));
        store.remove(&token).await;
        assert_eq!(store.get(&token).await, None);
    }

    #[tokio::test]
    async fn test_expired_session() {
        let store = SessionStore::new(Duration::seconds(-1));
        let token = store.create(7).await;
        assert_eq!(store.get(&token).await, None);
    }

    #[tokio::test]
    async fn test_create_sweeps_expired_sessions() {
        let store = SessionStore::new(Duration::seconds(-1));
        for user_id in 1..=5 {
            store.create(user_id).await;
        }
        // only the newest, already expired, session is left
        assert_eq!(store.sessions.read().await.len(), 1);

        let live = SessionStore {
            sessions: store.sessions.clone(),
            ttl: Duration::hours(1),
        };
        let token = live.create(9).await;
        assert_eq!(live.sessions.read().await.len(), 1);
        assert_eq!(live.get(&token).await, Some(9));
    }
}
