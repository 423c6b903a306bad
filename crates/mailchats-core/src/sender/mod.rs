//! Campaign sending engine
//!
//! Sends campaigns and test emails over the HTTP send API, the local MTA
//! or a list of rotating SMTP relays, recording per-recipient status and
//! publishing progress to the [`ProgressHub`](crate::progress::ProgressHub).

mod credentials;
mod engine;
mod transport;

pub use credentials::{parse_credentials, SmtpServer};
pub use engine::{CampaignEngine, CampaignJob, TestEmailRequest};
pub use transport::{
    mask_api_key, Deliver, DeliveryResult, Dispatcher, OutgoingEmail, Route,
};

use crate::merge::MergeMode;

/// Subject used when a campaign has no subjects file
pub const DEFAULT_CAMPAIGN_SUBJECT: &str = "Message from Thrly Api Sender V2";

/// Subject used for test emails without an uploaded subjects file
pub const DEFAULT_TEST_SUBJECT: &str =
    "Test Email with {{emailname}} variable from Thrly Api Sender";

/// How messages leave the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMethod {
    Api,
    Smtp,
}

impl SendMethod {
    /// "SMTP" (any case) selects SMTP; anything else is the API
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("smtp") {
            SendMethod::Smtp
        } else {
            SendMethod::Api
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SendMethod::Api => "API",
            SendMethod::Smtp => "SMTP",
        }
    }
}

/// Which SMTP target the SMTP method uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpMode {
    Localhost,
    Smtp,
}

impl SmtpMode {
    /// "smtp" (any case) selects an external relay; anything else is localhost
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("smtp") {
            SmtpMode::Smtp
        } else {
            SmtpMode::Localhost
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SmtpMode::Localhost => "localhost",
            SmtpMode::Smtp => "smtp",
        }
    }
}

/// Tracking options forwarded to the send API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracking {
    pub opens: bool,
    pub links: bool,
    pub replies: bool,
}

impl Default for Tracking {
    fn default() -> Self {
        Self {
            opens: true,
            links: true,
            replies: false,
        }
    }
}

/// Settings shared by campaign sends and test emails
#[derive(Debug, Clone)]
pub struct SendSettings {
    pub from_name: String,
    pub method: SendMethod,
    pub api_key: Option<String>,
    pub smtp_mode: SmtpMode,
    /// Single relay given field by field
    pub smtp_server: Option<SmtpServer>,
    /// Relays parsed from an uploaded credentials file, `None` when no file
    /// was uploaded. Takes precedence over `smtp_server`.
    pub credentials: Option<Vec<SmtpServer>>,
    pub rotate_smtp: bool,
    /// Emails per second
    pub send_speed: f64,
    pub tracking: Tracking,
    pub merge_mode: MergeMode,
}

impl Default for SendSettings {
    fn default() -> Self {
        Self {
            from_name: "Email Support".to_string(),
            method: SendMethod::Api,
            api_key: None,
            smtp_mode: SmtpMode::Localhost,
            smtp_server: None,
            credentials: None,
            rotate_smtp: false,
            send_speed: 10.0,
            tracking: Tracking::default(),
            merge_mode: MergeMode::Basic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        assert_eq!(SendMethod::parse("SMTP"), SendMethod::Smtp);
        assert_eq!(SendMethod::parse("smtp"), SendMethod::Smtp);
        assert_eq!(SendMethod::parse("API"), SendMethod::Api);
        assert_eq!(SendMethod::parse(""), SendMethod::Api);
        assert_eq!(SmtpMode::parse("smtp"), SmtpMode::Smtp);
        assert_eq!(SmtpMode::parse("localhost"), SmtpMode::Localhost);
        assert_eq!(SmtpMode::parse("weird"), SmtpMode::Localhost);
    }
}
