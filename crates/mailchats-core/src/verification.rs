//! One-time email verification codes
//!
//! Codes are six digits, kept in memory and consumed on first successful
//! verification. A new code replaces the previous one only once it has
//! actually been mailed.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mailchats_common::{config::VerificationConfig, Error, Result};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{error, info};

const SUBJECT: &str = "MailChats - Your Email Verification Code";

/// Delivers a verification code to an address
#[async_trait]
pub trait CodeMailer: Send + Sync {
    async fn send_code(&self, to: &str, code: &str, ttl_minutes: u64) -> Result<()>;
}

fn text_body(code: &str, ttl_minutes: u64) -> String {
    format!(
        "Your verification code is: {code}\n\nThis code will expire in {ttl_minutes} minutes.\n\nVisit mailchats.com for any questions or support."
    )
}

fn html_body(code: &str, ttl_minutes: u64) -> String {
    let year = Utc::now().year();
    format!(
        r#"
<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <div style="padding: 20px 0; text-align: center; background-color: #4a6cf7; border-radius: 8px 8px 0 0;">
    <h1 style="color: white; margin: 0; font-size: 28px;">MailChats.com</h1>
    <p style="color: white; margin: 5px 0 0 0; font-size: 16px;">Powerful Email Marketing Platform</p>
  </div>
  <div style="background-color: #ffffff; padding: 30px; border-left: 1px solid #e0e0e0; border-right: 1px solid #e0e0e0;">
    <h2 style="color: #333; text-align: center; margin-top: 0;">Welcome to MailChats</h2>
    <p style="color: #555; font-size: 16px; line-height: 1.5; text-align: center;">
      Please use the verification code below to complete your login:
    </p>
    <div style="background-color: #f8f9fa; padding: 20px; border-radius: 5px; text-align: center; margin: 20px 0;">
      <h3 style="margin-top: 0; color: #4a6cf7;">Your Verification Code</h3>
      <div style="font-size: 32px; font-weight: bold; letter-spacing: 5px; margin: 20px 0; color: #4a5568; background: #f0f4ff; padding: 10px; border-radius: 4px; border: 1px dashed #4a6cf7;">{code}</div>
      <p style="margin-bottom: 0; color: #666;">This code will expire in {ttl_minutes} minutes.</p>
    </div>
    <p style="color: #555; font-size: 15px; line-height: 1.5; text-align: center;">
      If you didn't request this code, please ignore this email.
    </p>
  </div>
  <div style="background-color: #f5f7ff; padding: 20px; text-align: center; border-radius: 0 0 8px 8px; border: 1px solid #e0e0e0; border-top: none;">
    <p style="margin: 0 0 10px 0; color: #666;">Need help? Contact our support team:</p>
    <a href="mailto:support@mailchats.com" style="color: #4a6cf7; text-decoration: none;">support@mailchats.com</a>
  </div>
  <p style="font-size: 12px; color: #718096; margin-top: 20px; text-align: center;">
    &copy; {year} MailChats.com. All rights reserved.
  </p>
</div>
"#
    )
}

/// Sends codes through the configured SMTP relay
pub struct SmtpCodeMailer {
    config: VerificationConfig,
}

impl SmtpCodeMailer {
    pub fn new(config: VerificationConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let host = self
            .config
            .smtp_host
            .as_deref()
            .ok_or_else(|| Error::Config("verification.smtp_host is not set".into()))?;

        let tls = TlsParameters::new(host.to_string())
            .map_err(|e| Error::Smtp(format!("TLS setup failed: {}", e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(self.config.smtp_port)
            .tls(Tls::Opportunistic(tls));

        if let (Some(user), Some(pass)) = (&self.config.smtp_username, &self.config.smtp_password)
        {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(builder.build())
    }

    fn sender(&self) -> Result<Mailbox> {
        let address = self
            .config
            .from_address
            .as_ref()
            .or(self.config.smtp_username.as_ref())
            .ok_or_else(|| Error::Config("verification.from_address is not set".into()))?;

        let address = address
            .parse()
            .map_err(|e| Error::Config(format!("Invalid verification sender: {}", e)))?;
        Ok(Mailbox::new(Some(self.config.from_name.clone()), address))
    }
}

#[async_trait]
impl CodeMailer for SmtpCodeMailer {
    async fn send_code(&self, to: &str, code: &str, ttl_minutes: u64) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Validation(format!("Invalid recipient: {}", e)))?;

        let message = Message::builder()
            .from(self.sender()?)
            .to(to)
            .subject(SUBJECT)
            .multipart(MultiPart::alternative_plain_html(
                text_body(code, ttl_minutes),
                html_body(code, ttl_minutes),
            ))
            .map_err(|e| Error::Smtp(format!("Failed to build email: {}", e)))?;

        self.transport()?
            .send(message)
            .await
            .map_err(|e| Error::Smtp(e.to_string()))?;
        Ok(())
    }
}

struct PendingCode {
    code: String,
    expires_at: Instant,
}

/// Issues and checks verification codes
pub struct VerificationService {
    codes: RwLock<HashMap<String, PendingCode>>,
    mailer: Arc<dyn CodeMailer>,
    ttl: Duration,
}

impl VerificationService {
    pub fn new(mailer: Arc<dyn CodeMailer>, ttl: Duration) -> Self {
        Self {
            codes: RwLock::new(HashMap::new()),
            mailer,
            ttl,
        }
    }

    /// Generate a code for `email`, mail it and remember it
    pub async fn send_code(&self, email: &str) -> Result<()> {
        if email.is_empty() || !email.contains('@') {
            return Err(Error::Validation(
                "Please provide a valid email address".into(),
            ));
        }

        let code = rand::thread_rng().gen_range(100_000..=999_999).to_string();
        let expires_at = Instant::now() + self.ttl;

        if let Err(e) = self
            .mailer
            .send_code(email, &code, self.ttl.as_secs() / 60)
            .await
        {
            error!("Error sending verification code to {}: {}", email, e);
            return Err(Error::Smtp("Failed to send verification code".into()));
        }

        info!("Verification code sent to {}", email);
        let mut codes = self.codes.write().await;
        let now = Instant::now();
        codes.retain(|_, pending| pending.expires_at > now);
        codes.insert(email.to_string(), PendingCode { code, expires_at });
        Ok(())
    }

    /// Check and consume a code
    pub async fn verify(&self, email: &str, code: &str) -> Result<()> {
        if email.is_empty() || code.is_empty() {
            return Err(Error::Validation(
                "Email and verification code are required".into(),
            ));
        }

        let mut codes = self.codes.write().await;
        let valid = codes
            .get(email)
            .is_some_and(|pending| pending.code == code && pending.expires_at > Instant::now());
        if !valid {
            return Err(Error::Validation(
                "Invalid or expired verification code".into(),
            ));
        }

        codes.remove(email);
        info!("Verification successful for {}", email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingMailer {
        fn last_code(&self) -> String {
            self.sent.lock().unwrap().last().unwrap().1.clone()
        }
    }

    #[async_trait]
    impl CodeMailer for RecordingMailer {
        async fn send_code(&self, to: &str, code: &str, _ttl_minutes: u64) -> Result<()> {
            if self.fail {
                return Err(Error::Smtp("connection refused".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), code.to_string()));
            Ok(())
        }
    }

    fn service(mailer: Arc<RecordingMailer>) -> VerificationService {
        VerificationService::new(mailer, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_send_and_verify() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone());

        svc.send_code("jane@example.com").await.unwrap();
        let code = mailer.last_code();
        assert_eq!(code.len(), 6);
        let n: u32 = code.parse().unwrap();
        assert!((100_000..=999_999).contains(&n));

        svc.verify("jane@example.com", &code).await.unwrap();
        // consumed
        let err = svc.verify("jane@example.com", &code).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Invalid or expired verification code");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let svc = service(Arc::new(RecordingMailer::default()));
        let err = svc.send_code("no-at-sign").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(err.to_string(), "Please provide a valid email address");

        let err = svc.verify("", "123456").await.unwrap_err();
        assert_eq!(err.to_string(), "Email and verification code are required");
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_pending_code() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone());
        svc.send_code("jane@example.com").await.unwrap();
        let code = mailer.last_code();

        let wrong = if code == "100000" { "100001" } else { "100000" };
        assert!(svc.verify("jane@example.com", wrong).await.is_err());
        svc.verify("jane@example.com", &code).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_code_expires() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone());
        svc.send_code("jane@example.com").await.unwrap();
        let code = mailer.last_code();

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(svc.verify("jane@example.com", &code).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sending_sweeps_expired_codes() {
        let mailer = Arc::new(RecordingMailer::default());
        let svc = service(mailer.clone());
        svc.send_code("old@example.com").await.unwrap();
        svc.send_code("recent@example.com").await.unwrap();

        tokio::time::advance(Duration::from_secs(601)).await;
        svc.send_code("new@example.com").await.unwrap();

        let codes = svc.codes.read().await;
        let mut pending: Vec<&str> = codes.keys().map(String::as_str).collect();
        pending.sort();
        assert_eq!(pending, vec!["new@example.com"]);
    }

    #[tokio::test]
    async fn test_failed_send_keeps_previous_code() {
        let good = Arc::new(RecordingMailer::default());
        let svc = service(good.clone());
        svc.send_code("jane@example.com").await.unwrap();
        let first = good.last_code();

        let failing = VerificationService {
            codes: RwLock::new(std::mem::take(&mut *svc.codes.write().await)),
            mailer: Arc::new(RecordingMailer {
                fail: true,
                ..Default::default()
            }),
            ttl: Duration::from_secs(600),
        };
        let err = failing.send_code("jane@example.com").await.unwrap_err();
        assert!(matches!(err, Error::Smtp(ref m) if m == "Failed to send verification code"));
        failing.verify("jane@example.com", &first).await.unwrap();
    }

    #[test]
    fn test_bodies_include_code() {
        assert!(text_body("482913", 10).starts_with("Your verification code is: 482913\n\n"));
        assert!(html_body("482913", 10).contains(">482913</div>"));
    }
}
