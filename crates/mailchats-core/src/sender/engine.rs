//! Campaign runs and test emails

use super::{
    DeliveryResult, Deliver, OutgoingEmail, Route, SendMethod, SendSettings, SmtpMode,
    Tracking, DEFAULT_CAMPAIGN_SUBJECT, DEFAULT_TEST_SUBJECT,
};
use crate::progress::{CampaignSnapshot, LogType, ProgressEvent, ProgressHub, StatusUpdate};
use anyhow::{anyhow, Result};
use chrono::{Local, Utc};
use mailchats_common::types::{CampaignId, EmailAddress};
use mailchats_storage::{
    CampaignStatus, NewEmailStatus, Storage, UpdateCampaign, UpdateEmailStatus,
};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Backup relays tried after a failed send
const MAX_BACKUP_ATTEMPTS: usize = 2;

/// Progress is logged on every tenth recipient
const PROGRESS_LOG_INTERVAL: usize = 10;

/// A campaign ready to run
#[derive(Debug, Clone)]
pub struct CampaignJob {
    pub campaign_id: CampaignId,
    pub html: String,
    /// Raw subjects file, one subject per line
    pub subjects: Option<String>,
    /// Raw recipients file, one recipient line per line
    pub recipients: String,
    pub settings: SendSettings,
}

/// A single test email
#[derive(Debug, Clone)]
pub struct TestEmailRequest {
    pub to: String,
    /// Uploaded template; the built-in test body is used when absent
    pub html: Option<String>,
    /// Uploaded subjects file; its first subject is used when present
    pub subjects: Option<String>,
    pub settings: SendSettings,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Counters {
    total: usize,
    sent: usize,
    success: usize,
    failed: usize,
}

impl Counters {
    fn update(&self) -> StatusUpdate {
        StatusUpdate {
            total: Some(self.total),
            sent: Some(self.sent),
            success: Some(self.success),
            failed: Some(self.failed),
            completed: None,
        }
    }
}

/// The routes a send may use and which one is current
struct RoutePlan {
    routes: Vec<Route>,
    current: usize,
    rotate: bool,
}

impl RoutePlan {
    fn build(settings: &SendSettings, default_api_key: Option<&str>) -> Result<Self> {
        let routes = match (settings.method, settings.smtp_mode) {
            (SendMethod::Api, _) => {
                let key = settings
                    .api_key
                    .as_deref()
                    .filter(|k| !k.is_empty())
                    .or(default_api_key)
                    .unwrap_or_default();
                vec![Route::Api {
                    key: key.to_string(),
                }]
            }
            (SendMethod::Smtp, SmtpMode::Localhost) => vec![Route::Localhost],
            // An uploaded file never falls back to the single relay
            (SendMethod::Smtp, SmtpMode::Smtp) => match (&settings.credentials, &settings.smtp_server) {
                (Some(servers), _) if servers.is_empty() => {
                    return Err(anyhow!(
                        "No valid SMTP credentials found in the credentials file"
                    ))
                }
                (Some(servers), _) => servers.iter().cloned().map(Route::Smtp).collect(),
                (None, Some(server)) => vec![Route::Smtp(server.clone())],
                (None, None) => {
                    return Err(anyhow!("SMTP credentials are required for SMTP mode"))
                }
            },
        };

        Ok(Self {
            routes,
            current: 0,
            rotate: settings.rotate_smtp,
        })
    }

    fn current(&self) -> &Route {
        &self.routes[self.current]
    }
}

fn route_host(route: &Route) -> &str {
    match route {
        Route::Api { .. } => "api",
        Route::Localhost => "localhost",
        Route::Smtp(server) => &server.host,
    }
}

fn load_subjects(content: Option<&str>) -> Vec<String> {
    let subjects: Vec<String> = content
        .unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if subjects.is_empty() {
        vec![DEFAULT_CAMPAIGN_SUBJECT.to_string()]
    } else {
        subjects
    }
}

fn pacing(send_speed: f64) -> Duration {
    if send_speed.is_finite() && send_speed > 0.0 {
        Duration::from_secs_f64(1.0 / send_speed)
    } else {
        Duration::ZERO
    }
}

fn default_test_body(from_name: &str) -> String {
    format!(
        r#"
    <html>
    <body>
        <h1>This is a test email from Thrly Api Sender V2</h1>
        <p>If you're seeing this, the email configuration is working correctly.</p>
        <p>Sent to: {{{{email}}}} at {{{{time}}}}</p>
        <p>Your username is {{{{emailname}}}} and domain is {{{{domain}}}}</p>
        <p>Sent from: {from_name}</p>
        <hr>
        <p>Mail merge is working correctly if you see your actual information above.</p>
    </body>
    </html>
    "#
    )
}

/// Runs campaigns and sends test emails
pub struct CampaignEngine {
    storage: Arc<dyn Storage>,
    hub: ProgressHub,
    deliver: Arc<dyn Deliver>,
    default_api_key: Option<String>,
}

impl CampaignEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        hub: ProgressHub,
        deliver: Arc<dyn Deliver>,
        default_api_key: Option<String>,
    ) -> Self {
        Self {
            storage,
            hub,
            deliver,
            default_api_key,
        }
    }

    fn emit(&self, log_type: LogType, message: impl Into<String>) {
        let message = message.into();
        match log_type {
            LogType::Error => error!("{}", message),
            LogType::Warning => warn!("{}", message),
            LogType::Info | LogType::Success => info!("{}", message),
        }
        self.hub.publish(ProgressEvent::log(message, log_type));
    }

    /// Run `job` in the background
    pub fn start_campaign(self: &Arc<Self>, job: CampaignJob) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run_campaign(job).await })
    }

    /// Run a campaign to completion, recording the outcome on the campaign row
    pub async fn run_campaign(&self, job: CampaignJob) {
        let campaign_id = job.campaign_id;

        self.hub.publish(ProgressEvent::CampaignStatus {
            campaign_id,
            status: CampaignSnapshot {
                total: 0,
                sent: 0,
                success: 0,
                failed: 0,
                start_time: Utc::now().timestamp_millis(),
            },
        });
        self.emit(
            LogType::Info,
            format!("Starting email campaign with ID: {}", campaign_id),
        );

        let (status, log_type, message) = match self.execute(job).await {
            Ok(()) => (
                CampaignStatus::Completed,
                LogType::Success,
                format!("Campaign {} completed successfully", campaign_id),
            ),
            Err(e) => (
                CampaignStatus::Failed,
                LogType::Error,
                format!("Campaign {} failed: {}", campaign_id, e),
            ),
        };

        let update = UpdateCampaign {
            status: Some(status.to_string()),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = self.storage.update_campaign(campaign_id, update).await {
            error!(campaign_id, "Failed to record campaign outcome: {}", e);
        }

        self.emit(log_type, message);
        self.hub.publish(ProgressEvent::status(
            campaign_id,
            StatusUpdate {
                completed: Some(true),
                ..Default::default()
            },
        ));
    }

    async fn execute(&self, job: CampaignJob) -> Result<()> {
        let campaign_id = job.campaign_id;
        let settings = &job.settings;
        let mode = settings.merge_mode;

        let subjects = load_subjects(job.subjects.as_deref());
        let recipients: Vec<&str> = job
            .recipients
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();

        self.emit(
            LogType::Info,
            format!(
                "Loaded {} subjects and {} recipients",
                subjects.len(),
                recipients.len()
            ),
        );

        self.storage
            .update_campaign(
                campaign_id,
                UpdateCampaign {
                    recipient_count: Some(i32::try_from(recipients.len())?),
                    status: Some(CampaignStatus::Processing.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        let mut plan = RoutePlan::build(settings, self.default_api_key.as_deref())?;
        if plan.routes.len() > 1 {
            self.emit(
                LogType::Info,
                format!("Using {} SMTP servers from credentials file", plan.routes.len()),
            );
            if plan.rotate {
                self.emit(
                    LogType::Info,
                    format!(
                        "SMTP server rotation enabled - will rotate between {} SMTP servers",
                        plan.routes.len()
                    ),
                );
            }
        }

        let mut counters = Counters {
            total: recipients.len(),
            ..Default::default()
        };
        self.hub
            .publish(ProgressEvent::status(campaign_id, counters.update()));

        let delay = pacing(settings.send_speed);

        for (index, line) in recipients.iter().enumerate() {
            let address = mode.address(line);
            let subject_template = &subjects[index % subjects.len()];

            if EmailAddress::parse(address).is_none() {
                self.emit(
                    LogType::Warning,
                    format!("Invalid email format for '{}', skipping", address),
                );
                self.storage
                    .create_email_status(NewEmailStatus {
                        campaign_id,
                        email: address.to_string(),
                        subject: subject_template.clone(),
                        failed: true,
                        failure_reason: Some("Invalid email format".to_string()),
                        ..Default::default()
                    })
                    .await?;
                counters.failed += 1;
                counters.sent = index + 1;
                self.hub
                    .publish(ProgressEvent::status(campaign_id, counters.update()));
                continue;
            }

            let now = Local::now();
            let email = OutgoingEmail {
                to: address.to_string(),
                from_name: mode.apply(&settings.from_name, line, now),
                subject: mode.apply(subject_template, line, now),
                html_body: mode.apply(&job.html, line, now),
            };

            let row = self
                .storage
                .create_email_status(NewEmailStatus {
                    campaign_id,
                    email: email.to.clone(),
                    subject: email.subject.clone(),
                    ..Default::default()
                })
                .await?;

            match self
                .send_with_backups(&mut plan, &email, &settings.tracking)
                .await
            {
                DeliveryResult::Sent { .. } => {
                    self.storage
                        .update_email_status(row.id, UpdateEmailStatus::sent())
                        .await?;
                    counters.success += 1;
                    if index % PROGRESS_LOG_INTERVAL == 0 {
                        self.emit(
                            LogType::Info,
                            format!("Sent {}/{} emails", index + 1, recipients.len()),
                        );
                    }
                }
                DeliveryResult::Failed { error } => {
                    self.storage
                        .update_email_status(row.id, UpdateEmailStatus::failed(error.clone()))
                        .await?;
                    counters.failed += 1;
                    self.emit(
                        LogType::Warning,
                        format!("Failed to send to {}: {}", email.to, error),
                    );
                }
            }

            counters.sent = index + 1;
            self.hub
                .publish(ProgressEvent::status(campaign_id, counters.update()));

            tokio::time::sleep(delay).await;
        }

        self.emit(LogType::Info, "Campaign complete!");
        self.emit(
            LogType::Info,
            format!(
                "Total emails: {}, successfully sent: {}, failed: {}",
                counters.total, counters.success, counters.failed
            ),
        );

        counters.sent = counters.total;
        self.hub
            .publish(ProgressEvent::status(campaign_id, counters.update()));

        Ok(())
    }

    /// Deliver along the current route, rotating and falling back to
    /// randomly chosen backup relays as configured
    async fn send_with_backups(
        &self,
        plan: &mut RoutePlan,
        email: &OutgoingEmail,
        tracking: &Tracking,
    ) -> DeliveryResult {
        let attempted = plan.current;
        let mut result = self.deliver.deliver(plan.current(), email, tracking).await;

        if plan.rotate && plan.routes.len() > 1 {
            plan.current = (plan.current + 1) % plan.routes.len();
            if let Route::Smtp(server) = plan.current() {
                self.emit(LogType::Info, format!("Rotating SMTP server: {}", server));
            }
        }

        if result.is_sent() || plan.routes.len() < 2 {
            return result;
        }

        let backups: Vec<usize> = {
            let candidates: Vec<usize> =
                (0..plan.routes.len()).filter(|&i| i != attempted).collect();
            let mut rng = rand::thread_rng();
            candidates
                .choose_multiple(&mut rng, MAX_BACKUP_ATTEMPTS)
                .copied()
                .collect()
        };

        for index in backups {
            let route = &plan.routes[index];
            self.emit(
                LogType::Warning,
                format!(
                    "Email send failed, trying backup SMTP server: {}",
                    route_host(route)
                ),
            );

            let retry = self.deliver.deliver(route, email, tracking).await;
            if retry.is_sent() {
                self.emit(
                    LogType::Info,
                    format!(
                        "Successfully sent using backup SMTP server {}",
                        route_host(route)
                    ),
                );
                plan.current = index;
                return retry;
            }
            result = retry;
        }

        result
    }

    /// Send one test email and report the outcome on the progress hub
    pub async fn send_test_email(&self, request: TestEmailRequest) -> Result<()> {
        let settings = &request.settings;
        let mode = settings.merge_mode;
        let to = request.to.trim();

        self.emit(LogType::Info, format!("Sending test email to {}...", to));

        let now = Local::now();
        let from_name = mode.apply(&settings.from_name, to, now);
        let subject_template = request
            .subjects
            .as_deref()
            .and_then(|s| s.lines().map(str::trim).find(|l| !l.is_empty()))
            .unwrap_or(DEFAULT_TEST_SUBJECT);
        let body_template = match request.html.as_deref() {
            Some(html) if !html.trim().is_empty() => html.to_string(),
            _ => default_test_body(&from_name),
        };

        let email = OutgoingEmail {
            to: mode.address(to).to_string(),
            subject: mode.apply(subject_template, to, now),
            html_body: mode.apply(&body_template, to, now),
            from_name,
        };

        let mut plan = match RoutePlan::build(settings, self.default_api_key.as_deref()) {
            Ok(plan) => plan,
            Err(e) => {
                self.emit(LogType::Error, format!("Error: {}", e));
                return Err(e);
            }
        };
        // A test email never rotates; the first relay is tried first
        plan.rotate = false;

        match self
            .send_with_backups(&mut plan, &email, &settings.tracking)
            .await
        {
            DeliveryResult::Sent { .. } => {
                self.emit(
                    LogType::Success,
                    format!("Test email sent successfully to {}", to),
                );
                Ok(())
            }
            DeliveryResult::Failed { error } => {
                self.emit(LogType::Error, format!("Error: {}", error));
                Err(anyhow!(error))
            }
        }
    }
}
