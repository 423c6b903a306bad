//! Campaign sending handlers (multipart uploads)

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use mailchats_common::config::MailerConfig;
use mailchats_core::merge::MergeMode;
use mailchats_core::sender::{
    parse_credentials, SendMethod, SmtpMode, SmtpServer, Tracking,
};
use mailchats_core::{CampaignJob, SendSettings, TestEmailRequest};
use mailchats_storage::{Campaign, CampaignStats, CampaignStatus, NewCampaign, UpdateCampaign};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::campaigns::INVALID_CAMPAIGN_ID;
use super::parse_id;
use crate::auth::AppState;
use crate::error::{api_error, bad_request, from_error, not_found, ApiError};

/// Plain `{message}` acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Reply to a campaign start
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStarted {
    pub message: String,
    pub campaign_id: i32,
}

/// Text fields and uploaded files of a send form, keyed by field name
#[derive(Debug, Default)]
pub struct SendForm {
    values: HashMap<String, String>,
}

impl SendForm {
    /// Drain a multipart body. Uploaded files are read as UTF-8 text.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut values = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request(format!("Invalid multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|e| bad_request(format!("Invalid upload for {}: {}", name, e)))?;
            values.insert(name, value);
        }
        Ok(Self { values })
    }

    #[cfg(test)]
    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// A present, non-blank value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// `true` only for the literal string "true"
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| v.trim() == "true")
    }

    fn send_speed(&self) -> Option<i32> {
        self.get("sendSpeed")
            .and_then(|v| v.trim().parse::<i32>().ok())
            .filter(|speed| *speed > 0)
    }

    /// Send settings from the form, falling back to the mailer defaults
    pub fn settings(&self, defaults: &MailerConfig, merge_mode: MergeMode) -> SendSettings {
        let credentials = self.get("smtpCredentialsFile").map(parse_credentials);
        // rotation only applies to an uploaded credentials list
        let rotate_smtp = credentials.is_some() && self.flag("rotateSmtp");

        SendSettings {
            from_name: self
                .get("fromName")
                .unwrap_or(&defaults.default_from_name)
                .to_string(),
            method: SendMethod::parse(self.get("sendMethod").unwrap_or("API")),
            api_key: self.get("apiKey").map(str::to_string),
            smtp_mode: SmtpMode::parse(self.get("smtpMode").unwrap_or("localhost")),
            smtp_server: SmtpServer::from_parts(
                self.get("smtpHost"),
                self.get("smtpPort"),
                self.get("smtpUsername"),
                self.get("smtpPassword"),
            ),
            credentials,
            rotate_smtp,
            send_speed: self
                .send_speed()
                .map(f64::from)
                .unwrap_or(defaults.default_send_speed),
            tracking: Tracking {
                opens: self.flag("trackOpens"),
                links: self.flag("trackLinks"),
                replies: self.flag("trackReplies"),
            },
            merge_mode,
        }
    }

    /// Campaign record describing this send
    fn new_campaign(&self, settings: &SendSettings) -> NewCampaign {
        NewCampaign {
            name: "Campaign".to_string(),
            from_name: settings.from_name.clone(),
            send_method: settings.method.as_str().to_string(),
            api_key: settings.api_key.clone(),
            smtp_mode: Some(settings.smtp_mode.as_str().to_string()),
            smtp_host: self.get("smtpHost").map(str::to_string),
            smtp_port: Some(
                self.get("smtpPort")
                    .and_then(|p| p.trim().parse().ok())
                    .unwrap_or(587),
            ),
            smtp_username: self.get("smtpUsername").map(str::to_string),
            smtp_password: self.get("smtpPassword").map(str::to_string),
            rotate_smtp: settings.rotate_smtp,
            send_speed: self.send_speed().unwrap_or(10),
            track_opens: settings.tracking.opens,
            track_links: settings.tracking.links,
            track_replies: settings.tracking.replies,
            recipient_count: 0,
            status: Some(CampaignStatus::Processing.to_string()),
        }
    }
}

async fn send_test(
    state: &AppState,
    form: SendForm,
    merge_mode: MergeMode,
    success: &str,
) -> Result<Json<MessageResponse>, ApiError> {
    let html = form
        .get("htmlFile")
        .ok_or_else(|| bad_request("HTML template file is required"))?;
    let to = form
        .get("testEmail")
        .ok_or_else(|| bad_request("Test email address is required"))?
        .trim()
        .to_string();

    if form.flag("usedTemplateVars") || form.flag("useEnhancedVariables") {
        info!("Using template variables for test email to {}", to);
    }

    let request = TestEmailRequest {
        to,
        html: Some(html.to_string()),
        subjects: form.get("subjectsFile").map(str::to_string),
        settings: form.settings(&state.config.mailer, merge_mode),
    };

    match state.engine.send_test_email(request).await {
        Ok(()) => Ok(Json(MessageResponse {
            message: success.to_string(),
        })),
        Err(e) => Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "send_failed",
            e.to_string(),
        )),
    }
}

/// POST /api/email/test
pub async fn test_email(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let form = SendForm::read(multipart).await?;
    let merge_mode = MergeMode::from_enhanced_flag(form.flag("enhancedRecipientFormat"));
    send_test(&state, form, merge_mode, "Test email sent successfully").await
}

/// POST /api/email/enhanced-test
pub async fn enhanced_test_email(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<MessageResponse>, ApiError> {
    let form = SendForm::read(multipart).await?;
    send_test(
        &state,
        form,
        MergeMode::Enhanced,
        "Enhanced test email sent successfully",
    )
    .await
}

/// POST /api/email/send
pub async fn send_campaign(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<CampaignStarted>, ApiError> {
    let form = SendForm::read(multipart).await?;
    let (Some(html), Some(subjects), Some(recipients)) = (
        form.get("htmlFile"),
        form.get("subjectsFile"),
        form.get("recipientsFile"),
    ) else {
        return Err(bad_request(
            "HTML template, subjects, and recipients files are required",
        ));
    };

    let merge_mode = MergeMode::from_enhanced_flag(form.flag("enhancedRecipientFormat"));
    let settings = form.settings(&state.config.mailer, merge_mode);

    let context = "An error occurred while starting the email campaign";
    let campaign = state
        .storage
        .create_campaign(form.new_campaign(&settings))
        .await
        .map_err(|e| from_error(e, context))?;
    let campaign_id = campaign.id;
    state
        .storage
        .update_campaign(
            campaign_id,
            UpdateCampaign {
                name: Some(format!("Campaign-{}", campaign_id)),
                ..Default::default()
            },
        )
        .await
        .map_err(|e| from_error(e, context))?;

    info!(campaign_id, merge = ?merge_mode, "Starting campaign");
    state.engine.start_campaign(CampaignJob {
        campaign_id,
        html: html.to_string(),
        subjects: Some(subjects.to_string()),
        recipients: recipients.to_string(),
        settings,
    });

    Ok(Json(CampaignStarted {
        message: "Email campaign started".to_string(),
        campaign_id,
    }))
}

/// GET /api/email/campaigns
pub async fn list_campaigns(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Campaign>>, ApiError> {
    let campaigns = state.storage.list_campaigns().await.map_err(|e| {
        error!("Error fetching campaigns: {}", e);
        from_error(e, "An error occurred while fetching campaigns")
    })?;
    Ok(Json(campaigns))
}

/// GET /api/email/campaigns/:id
pub async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>, ApiError> {
    let id = parse_id(&id, INVALID_CAMPAIGN_ID)?;
    let campaign = state
        .storage
        .get_campaign(id)
        .await
        .map_err(|e| from_error(e, "An error occurred while fetching the campaign"))?
        .ok_or_else(|| not_found("Campaign not found"))?;
    Ok(Json(campaign))
}

/// GET /api/email/campaigns/:id/stats
pub async fn campaign_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignStats>, ApiError> {
    let id = parse_id(&id, INVALID_CAMPAIGN_ID)?;
    let stats = state
        .storage
        .get_campaign_stats(id)
        .await
        .map_err(|e| from_error(e, "An error occurred while fetching campaign stats"))?;
    debug!(campaign_id = id, ?stats, "Campaign stats");
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{message, multipart, TestApp};
    use mailchats_storage::Storage;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::time::Duration;

    #[test]
    fn test_form_settings_defaults() {
        let form = SendForm::from_pairs(&[("fromName", "  "), ("sendSpeed", "abc")]);
        let settings = form.settings(&MailerConfig::default(), MergeMode::Basic);

        assert_eq!(settings.from_name, "Email Support");
        assert_eq!(settings.method, SendMethod::Api);
        assert_eq!(settings.smtp_mode, SmtpMode::Localhost);
        assert_eq!(settings.send_speed, 10.0);
        assert!(settings.smtp_server.is_none());
        assert!(!settings.tracking.opens);

        let campaign = form.new_campaign(&settings);
        assert_eq!(campaign.smtp_port, Some(587));
        assert_eq!(campaign.send_speed, 10);
        assert_eq!(campaign.status.as_deref(), Some("processing"));
    }

    #[test]
    fn test_form_settings_smtp() {
        let form = SendForm::from_pairs(&[
            ("sendMethod", "SMTP"),
            ("smtpMode", "smtp"),
            ("smtpHost", "mail.example.com"),
            ("smtpPort", "465"),
            ("smtpUsername", "io@example.com"),
            ("smtpPassword", "pw"),
            ("rotateSmtp", "true"),
            ("sendSpeed", "3"),
            ("trackOpens", "true"),
            ("trackLinks", "false"),
        ]);
        let settings = form.settings(&MailerConfig::default(), MergeMode::Enhanced);

        assert_eq!(settings.method, SendMethod::Smtp);
        assert_eq!(settings.smtp_mode, SmtpMode::Smtp);
        assert_eq!(settings.smtp_server.as_ref().unwrap().port, 465);
        // no credentials file, so no rotation
        assert!(!settings.rotate_smtp);
        assert_eq!(settings.send_speed, 3.0);
        assert!(settings.tracking.opens);
        assert!(!settings.tracking.links);
        assert_eq!(settings.merge_mode, MergeMode::Enhanced);
    }

    #[test]
    fn test_form_credentials_file_enables_rotation() {
        let form = SendForm::from_pairs(&[
            (
                "smtpCredentialsFile",
                "a.example.com,587,u1,p1\nb.example.com,2525,u2,p2\n",
            ),
            ("rotateSmtp", "true"),
        ]);
        let settings = form.settings(&MailerConfig::default(), MergeMode::Basic);
        assert_eq!(settings.credentials.as_ref().map(Vec::len), Some(2));
        assert!(settings.rotate_smtp);

        // an uploaded file without usable lines is kept apart from no file
        let form = SendForm::from_pairs(&[("smtpCredentialsFile", "not,enough\n")]);
        let settings = form.settings(&MailerConfig::default(), MergeMode::Basic);
        assert_eq!(settings.credentials, Some(Vec::new()));

        let settings = SendForm::default().settings(&MailerConfig::default(), MergeMode::Basic);
        assert_eq!(settings.credentials, None);
    }

    #[tokio::test]
    async fn test_test_email_requires_files() {
        let app = TestApp::new().await;

        let (body, content_type) = multipart(&[("testEmail", "me@example.com")], &[]);
        let response = app
            .server
            .post("/api/email/test")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(message(&response.json()), "HTML template file is required");

        let (body, content_type) = multipart(&[], &[("htmlFile", "<p>Hi</p>")]);
        let response = app
            .server
            .post("/api/email/test")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(message(&response.json()), "Test email address is required");
    }

    #[tokio::test]
    async fn test_test_email_is_delivered() {
        let app = TestApp::new().await;

        let (body, content_type) = multipart(
            &[("testEmail", "jane.doe@acme.com"), ("fromName", "Acme")],
            &[
                ("htmlFile", "<p>Hello {emailname} at {{domain}}</p>"),
                ("subjectsFile", "\nNews for {email}\nSecond\n"),
            ],
        );
        let response = app
            .server
            .post("/api/email/test")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        response.assert_status_ok();
        assert_eq!(message(&response.json()), "Test email sent successfully");

        let sent = app.deliver.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "jane.doe@acme.com");
        assert_eq!(sent[0].from_name, "Acme");
        assert_eq!(sent[0].subject, "News for jane.doe@acme.com");
        assert_eq!(sent[0].html_body, "<p>Hello jane.doe at acme.com</p>");
    }

    #[tokio::test]
    async fn test_enhanced_test_email() {
        let app = TestApp::new().await;

        let (body, content_type) = multipart(
            &[("testEmail", "jane.doe@acme.com")],
            &[("htmlFile", "<p>Hi {firstname} from {company}</p>")],
        );
        let response = app
            .server
            .post("/api/email/enhanced-test")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        response.assert_status_ok();
        assert_eq!(
            message(&response.json()),
            "Enhanced test email sent successfully"
        );
        let sent = app.deliver.sent.lock().unwrap();
        assert_eq!(sent[0].html_body, "<p>Hi Jane from Acme</p>");
    }

    #[tokio::test]
    async fn test_send_requires_all_files() {
        let app = TestApp::new().await;
        let (body, content_type) = multipart(&[], &[("htmlFile", "<p>Hi</p>")]);
        let response = app
            .server
            .post("/api/email/send")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            message(&response.json()),
            "HTML template, subjects, and recipients files are required"
        );
    }

    #[tokio::test]
    async fn test_send_campaign_runs_to_completion() {
        let app = TestApp::new().await;
        let (body, content_type) = multipart(
            &[("sendSpeed", "1000")],
            &[
                ("htmlFile", "<p>Hi {email}</p>"),
                ("subjectsFile", "Hello"),
                ("recipientsFile", "a@example.com\nb@example.com\n"),
            ],
        );
        let response = app
            .server
            .post("/api/email/send")
            .bytes(body.into())
            .content_type(&content_type)
            .await;
        response.assert_status_ok();
        let started: CampaignStarted = response.json();
        assert_eq!(started.message, "Email campaign started");
        let id = started.campaign_id;

        let campaign: Value = app
            .server
            .get(&format!("/api/email/campaigns/{id}"))
            .await
            .json();
        assert_eq!(campaign["name"], format!("Campaign-{id}"));

        let mut stats = CampaignStats::default();
        for _ in 0..100 {
            stats = app
                .server
                .get(&format!("/api/email/campaigns/{id}/stats"))
                .await
                .json();
            if stats.sent == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(
            stats,
            CampaignStats {
                total: 2,
                sent: 2,
                success: 2,
                failed: 0
            }
        );

        let campaigns: Vec<Value> = app.server.get("/api/email/campaigns").await.json();
        assert_eq!(campaigns.len(), 1);
    }

    #[tokio::test]
    async fn test_campaign_listing_hides_secrets() {
        let app = TestApp::new().await;
        let (body, content_type) = multipart(
            &[
                ("sendSpeed", "1000"),
                ("apiKey", "sk-live-SECRETKEY123456"),
                ("smtpHost", "mail.example.com"),
                ("smtpUsername", "io@example.com"),
                ("smtpPassword", "hunter2"),
            ],
            &[
                ("htmlFile", "<p>Hi</p>"),
                ("subjectsFile", "Hello"),
                ("recipientsFile", "a@example.com"),
            ],
        );
        let started: CampaignStarted = app
            .server
            .post("/api/email/send")
            .bytes(body.into())
            .content_type(&content_type)
            .await
            .json();

        let listed: Vec<Value> = app.server.get("/api/email/campaigns").await.json();
        let single: Value = app
            .server
            .get(&format!("/api/email/campaigns/{}", started.campaign_id))
            .await
            .json();

        for campaign in [&listed[0], &single] {
            assert_eq!(campaign["smtpUsername"], "io@example.com");
            assert!(campaign.get("apiKey").is_none());
            assert!(campaign.get("smtpPassword").is_none());
            let text = campaign.to_string();
            assert!(!text.contains("SECRETKEY"));
            assert!(!text.contains("hunter2"));
        }

        // the stored row still carries them for the engine
        let stored = app
            .state
            .storage
            .get_campaign(started.campaign_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.api_key.as_deref(), Some("sk-live-SECRETKEY123456"));
        assert_eq!(stored.smtp_password.as_deref(), Some("hunter2"));
    }

    #[tokio::test]
    async fn test_unknown_campaign() {
        let app = TestApp::new().await;
        let response = app.server.get("/api/email/campaigns/42").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(message(&response.json()), "Campaign not found");
    }
}
