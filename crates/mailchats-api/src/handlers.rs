//! API request handlers

pub mod ai;
pub mod auth;
pub mod campaigns;
pub mod email;
pub mod email_statuses;
pub mod health;
pub mod personalization;
pub mod theme;
pub mod ws;

use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{api_error, bad_request, ApiError};

/// JSON request body whose rejections use the `{error, message}` shape
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(api_error(
                rejection.status(),
                "invalid_body",
                rejection.body_text(),
            )),
        }
    }
}

/// Parse a numeric path id, answering 400 with `message` otherwise
pub(crate) fn parse_id(raw: &str, message: &str) -> Result<i32, ApiError> {
    raw.parse().map_err(|_| bad_request(message))
}

/// Deserialize a JSON body, answering 400 with the serde error otherwise
pub(crate) fn parse_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| bad_request(e.to_string()))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::auth::{AppState, SessionStore};
    use crate::routes::create_router;
    use async_trait::async_trait;
    use axum_test::TestServer;
    use mailchats_common::{config::AuthConfig, Config};
    use mailchats_core::sender::{Deliver, DeliveryResult, OutgoingEmail, Route, Tracking};
    use mailchats_core::{
        CampaignEngine, CodeMailer, DeepSeekClient, LicenseVerifier, ProgressHub, ThemeStore,
        VerificationService,
    };
    use mailchats_storage::{MemStorage, Storage};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records deliveries instead of sending them
    #[derive(Default)]
    pub struct RecordingDeliver {
        pub sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Deliver for RecordingDeliver {
        async fn deliver(
            &self,
            _route: &Route,
            email: &OutgoingEmail,
            _tracking: &Tracking,
        ) -> DeliveryResult {
            self.sent.lock().unwrap().push(email.clone());
            DeliveryResult::Sent {
                message_id: format!("msg-{}", email.to),
            }
        }
    }

    /// Records verification codes instead of mailing them
    #[derive(Default)]
    pub struct RecordingMailer {
        pub codes: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CodeMailer for RecordingMailer {
        async fn send_code(
            &self,
            to: &str,
            code: &str,
            _ttl_minutes: u64,
        ) -> mailchats_common::Result<()> {
            self.codes
                .lock()
                .unwrap()
                .push((to.to_string(), code.to_string()));
            Ok(())
        }
    }

    pub struct TestApp {
        pub server: TestServer,
        pub state: AppState,
        pub deliver: Arc<RecordingDeliver>,
        pub mailer: Arc<RecordingMailer>,
        _dir: TempDir,
    }

    impl TestApp {
        pub async fn new() -> Self {
            Self::with_config(Config::default()).await
        }

        pub async fn with_config(mut config: Config) -> Self {
            let dir = TempDir::new().unwrap();
            config.theme.path = dir.path().join("theme.json");
            config.auth = AuthConfig {
                license_url: "http://127.0.0.1:9/license.txt".into(),
                ..config.auth
            };

            let storage: Arc<dyn Storage> = Arc::new(MemStorage::new());
            let hub = ProgressHub::default();
            let deliver = Arc::new(RecordingDeliver::default());
            let mailer = Arc::new(RecordingMailer::default());

            let state = AppState {
                engine: Arc::new(CampaignEngine::new(
                    storage.clone(),
                    hub.clone(),
                    deliver.clone(),
                    None,
                )),
                ai: Arc::new(DeepSeekClient::new(&config.ai)),
                verification: Arc::new(VerificationService::new(
                    mailer.clone(),
                    Duration::from_secs(600),
                )),
                theme: Arc::new(ThemeStore::new(&config.theme.path, hub.clone())),
                license: Arc::new(LicenseVerifier::new(&config.auth)),
                sessions: SessionStore::new(chrono::Duration::hours(1)),
                config: Arc::new(config),
                storage,
                hub,
            };

            let server = TestServer::new(create_router(state.clone())).unwrap();
            Self {
                server,
                state,
                deliver,
                mailer,
                _dir: dir,
            }
        }

        /// Register a user and return the bearer header value
        pub async fn login(&self) -> String {
            let response = self
                .server
                .post("/api/register")
                .json(&json!({"username": "jane", "password": "s3cret"}))
                .await;
            let token = response.cookie(crate::auth::SESSION_COOKIE);
            format!("Bearer {}", token.value())
        }
    }

    /// Build a multipart/form-data body from text fields and files
    pub fn multipart(fields: &[(&str, &str)], files: &[(&str, &str)]) -> (Vec<u8>, String) {
        let boundary = "mailchats-test-boundary";
        let mut body = String::new();
        for (name, value) in fields {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        for (name, content) in files {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.txt\"\r\nContent-Type: text/plain\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        (
            body.into_bytes(),
            format!("multipart/form-data; boundary={boundary}"),
        )
    }

    pub fn message(body: &Value) -> &str {
        body["message"].as_str().unwrap_or_default()
    }
}
