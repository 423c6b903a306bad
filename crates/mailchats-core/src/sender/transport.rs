//! Message delivery over the send API, the local MTA or an SMTP relay

use super::{SmtpServer, Tracking};
use async_trait::async_trait;
use chrono::Utc;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailchats_common::config::MailerConfig;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Where a single message goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// HTTP send API with a bearer key
    Api { key: String },
    /// `localhost:25`, no auth, no TLS
    Localhost,
    /// External relay with login and opportunistic STARTTLS
    Smtp(SmtpServer),
}

/// A fully personalized message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub from_name: String,
    pub subject: String,
    pub html_body: String,
}

/// Result of a delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    Sent { message_id: String },
    Failed { error: String },
}

impl DeliveryResult {
    pub fn is_sent(&self) -> bool {
        matches!(self, DeliveryResult::Sent { .. })
    }
}

/// Sends one message along one route
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(
        &self,
        route: &Route,
        email: &OutgoingEmail,
        tracking: &Tracking,
    ) -> DeliveryResult;
}

/// Mask an API key for logging: first 5 + "..." + last 5, or "***"
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 5..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "***".to_string()
    }
}

fn generate_message_id() -> String {
    format!("<{}.{}@mailchats>", Uuid::new_v4(), Utc::now().timestamp())
}

/// Production delivery backend
pub struct Dispatcher {
    client: Client,
    api_url: Option<String>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(config: &MailerConfig) -> Self {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url: config.api_url.clone(),
            timeout,
        }
    }

    async fn send_api(
        &self,
        key: &str,
        email: &OutgoingEmail,
        tracking: &Tracking,
    ) -> DeliveryResult {
        info!(
            "Sending email to {} via API using key {}",
            email.to,
            mask_api_key(key)
        );

        let Some(url) = &self.api_url else {
            debug!("No send API endpoint configured, simulating delivery");
            return DeliveryResult::Sent {
                message_id: generate_message_id(),
            };
        };

        let body = json!({
            "subject": email.subject,
            "body": email.html_body,
            "from": [{ "name": email.from_name }],
            "to": [{ "email": email.to }],
            "tracking_options": {
                "opens": tracking.opens,
                "links": tracking.links,
                "thread_replies": tracking.replies,
            },
        });

        let response = match self.client.post(url).bearer_auth(key).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                return DeliveryResult::Failed {
                    error: format!("Send API request failed: {}", e),
                }
            }
        };

        let status = response.status();
        if status.is_success() {
            let message_id = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v.get("id").and_then(|id| id.as_str()).map(str::to_string))
                .unwrap_or_else(generate_message_id);
            DeliveryResult::Sent { message_id }
        } else {
            let text = response.text().await.unwrap_or_default();
            DeliveryResult::Failed {
                error: format!("Send API returned {}: {}", status, text),
            }
        }
    }

    /// Build the MIME message and its Message-ID
    fn build_message(
        email: &OutgoingEmail,
        from_address: &str,
    ) -> Result<(Message, String), String> {
        let from_address: Address = from_address
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| format!("Invalid to address: {}", e))?;

        let message_id = generate_message_id();
        let message = Message::builder()
            .from(Mailbox::new(Some(email.from_name.clone()), from_address))
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.clone()))
            .header(ContentType::TEXT_HTML)
            .body(email.html_body.clone())
            .map_err(|e| format!("Failed to build email: {}", e))?;

        Ok((message, message_id))
    }

    async fn send_localhost(&self, email: &OutgoingEmail) -> DeliveryResult {
        let (message, message_id) = match Self::build_message(email, "noreply@localhost") {
            Ok(m) => m,
            Err(error) => return DeliveryResult::Failed { error },
        };

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous("localhost")
            .port(25)
            .timeout(Some(self.timeout))
            .build();

        match mailer.send(message).await {
            Ok(response) => {
                debug!("Email sent via localhost: {:?}", response);
                DeliveryResult::Sent { message_id }
            }
            Err(e) => DeliveryResult::Failed {
                error: format!("Error sending to {}: {}", email.to, e),
            },
        }
    }

    async fn send_smtp(&self, server: &SmtpServer, email: &OutgoingEmail) -> DeliveryResult {
        let (message, message_id) = match Self::build_message(email, &server.username) {
            Ok(m) => m,
            Err(error) => return DeliveryResult::Failed { error },
        };

        let tls = match TlsParameters::new(server.host.clone()) {
            Ok(params) => Tls::Opportunistic(params),
            Err(e) => {
                return DeliveryResult::Failed {
                    error: format!("Failed to set up TLS for {}: {}", server.host, e),
                }
            }
        };

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&server.host)
            .port(server.port)
            .tls(tls)
            .credentials(Credentials::new(
                server.username.clone(),
                server.password.clone(),
            ))
            .timeout(Some(self.timeout))
            .build();

        match mailer.send(message).await {
            Ok(_) => {
                info!("Email sent successfully to {} via SMTP.", email.to);
                DeliveryResult::Sent { message_id }
            }
            Err(e) => {
                warn!("Failed to send email to {} via SMTP: {}", email.to, e);
                DeliveryResult::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl Deliver for Dispatcher {
    async fn deliver(
        &self,
        route: &Route,
        email: &OutgoingEmail,
        tracking: &Tracking,
    ) -> DeliveryResult {
        match route {
            Route::Api { key } => self.send_api(key, email, tracking).await,
            Route::Localhost => self.send_localhost(email).await,
            Route::Smtp(server) => self.send_smtp(server, email).await,
        }
    }
}
