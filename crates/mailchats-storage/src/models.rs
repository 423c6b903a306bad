//! Database models

use chrono::{DateTime, Utc};
use mailchats_common::types::{CampaignId, EmailStatusId, UserId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// User model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Argon2 PHC string
    #[serde(skip_serializing)]
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user (password already hashed)
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
}

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Draft,
    Processing,
    Completed,
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Processing => "processing",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "processing" => Ok(CampaignStatus::Processing),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(format!("unknown campaign status: {}", other)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub from_name: String,
    /// "API" or "SMTP"
    pub send_method: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// "localhost" or "smtp"
    pub smtp_mode: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    #[serde(skip_serializing)]
    pub smtp_password: Option<String>,
    pub rotate_smtp: bool,
    pub send_speed: i32,
    pub track_opens: bool,
    pub track_links: bool,
    pub track_replies: bool,
    pub recipient_count: i32,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a campaign
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCampaign {
    pub name: String,
    pub from_name: String,
    pub send_method: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub smtp_mode: Option<String>,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<i32>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub rotate_smtp: bool,
    #[serde(default = "default_send_speed")]
    pub send_speed: i32,
    #[serde(default = "default_true")]
    pub track_opens: bool,
    #[serde(default = "default_true")]
    pub track_links: bool,
    #[serde(default)]
    pub track_replies: bool,
    #[serde(default)]
    pub recipient_count: i32,
    /// Defaults to "processing" when absent
    #[serde(default)]
    pub status: Option<String>,
}

fn default_send_speed() -> i32 {
    10
}

fn default_true() -> bool {
    true
}

/// Partial campaign update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCampaign {
    pub name: Option<String>,
    pub from_name: Option<String>,
    pub send_method: Option<String>,
    pub api_key: Option<String>,
    pub smtp_mode: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<i32>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub rotate_smtp: Option<bool>,
    pub send_speed: Option<i32>,
    pub track_opens: Option<bool>,
    pub track_links: Option<bool>,
    pub track_replies: Option<bool>,
    pub recipient_count: Option<i32>,
    pub status: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UpdateCampaign {
    /// Apply the present fields to `campaign` and bump `updated_at`
    pub fn apply(self, campaign: &mut Campaign, now: DateTime<Utc>) {
        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { campaign.$field = v; })*
            };
        }
        macro_rules! set_opt {
            ($($field:ident),*) => {
                $(if let Some(v) = self.$field { campaign.$field = Some(v); })*
            };
        }

        set!(
            name,
            from_name,
            send_method,
            rotate_smtp,
            send_speed,
            track_opens,
            track_links,
            track_replies,
            recipient_count,
            status
        );
        set_opt!(
            api_key,
            smtp_mode,
            smtp_host,
            smtp_port,
            smtp_username,
            smtp_password,
            completed_at
        );
        campaign.updated_at = now;
    }
}

/// Email status model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailStatus {
    pub id: EmailStatusId,
    pub campaign_id: CampaignId,
    pub email: String,
    pub subject: String,
    pub sent: bool,
    pub delivered: bool,
    pub opened: bool,
    pub clicked: bool,
    pub replied: bool,
    pub failed: bool,
    pub failure_reason: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    pub clicked_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an email status row
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmailStatus {
    /// Taken from the route when created over HTTP
    #[serde(default)]
    pub campaign_id: CampaignId,
    pub email: String,
    pub subject: String,
    #[serde(default)]
    pub sent: bool,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Partial email status update
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailStatus {
    pub subject: Option<String>,
    pub sent: Option<bool>,
    pub delivered: Option<bool>,
    pub opened: Option<bool>,
    pub clicked: Option<bool>,
    pub replied: Option<bool>,
    pub failed: Option<bool>,
    pub failure_reason: Option<String>,
}

impl UpdateEmailStatus {
    /// Mark a row as sent
    pub fn sent() -> Self {
        Self {
            sent: Some(true),
            ..Default::default()
        }
    }

    /// Mark a row as failed with a reason
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            failed: Some(true),
            failure_reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Apply the present fields to `status`.
    ///
    /// Event timestamps are stamped only when their flag flips from false to true.
    pub fn apply(self, status: &mut EmailStatus, now: DateTime<Utc>) {
        fn flip(
            flag: &mut bool,
            at: Option<&mut Option<DateTime<Utc>>>,
            new: Option<bool>,
            now: DateTime<Utc>,
        ) {
            if let Some(new) = new {
                if new && !*flag {
                    if let Some(at) = at {
                        *at = Some(now);
                    }
                }
                *flag = new;
            }
        }

        if let Some(subject) = self.subject {
            status.subject = subject;
        }
        flip(&mut status.sent, Some(&mut status.sent_at), self.sent, now);
        flip(&mut status.delivered, None, self.delivered, now);
        flip(&mut status.opened, Some(&mut status.opened_at), self.opened, now);
        flip(&mut status.clicked, Some(&mut status.clicked_at), self.clicked, now);
        flip(&mut status.replied, Some(&mut status.replied_at), self.replied, now);
        flip(&mut status.failed, None, self.failed, now);
        if let Some(reason) = self.failure_reason {
            status.failure_reason = Some(reason);
        }
        status.updated_at = now;
    }
}

/// Aggregate delivery counts for a campaign
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total: i64,
    pub sent: i64,
    pub success: i64,
    pub failed: i64,
}

impl CampaignStats {
    /// Compute stats from a campaign's recipient count and its status rows
    pub fn from_statuses(total: i32, statuses: &[EmailStatus]) -> Self {
        Self {
            total: i64::from(total),
            sent: statuses.iter().filter(|s| s.sent).count() as i64,
            success: statuses.iter().filter(|s| s.sent && !s.failed).count() as i64,
            failed: statuses.iter().filter(|s| s.failed).count() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn status(now: DateTime<Utc>) -> EmailStatus {
        EmailStatus {
            id: 1,
            campaign_id: 1,
            email: "a@example.com".into(),
            subject: "Hi".into(),
            sent: false,
            delivered: false,
            opened: false,
            clicked: false,
            replied: false,
            failed: false,
            failure_reason: None,
            sent_at: None,
            opened_at: None,
            clicked_at: None,
            replied_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_status_roundtrip_str() {
        for s in ["draft", "processing", "completed", "failed"] {
            assert_eq!(s.parse::<CampaignStatus>().unwrap().to_string(), s);
        }
        assert!("paused".parse::<CampaignStatus>().is_err());
    }

    #[test]
    fn test_update_stamps_on_flip_only() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let now = Utc::now();
        let mut row = status(created);

        UpdateEmailStatus {
            opened: Some(true),
            ..Default::default()
        }
        .apply(&mut row, now);
        assert!(row.opened);
        assert_eq!(row.opened_at, Some(now));
        assert_eq!(row.sent_at, None);

        // Already opened: timestamp stays put
        let later = now + chrono::Duration::minutes(5);
        UpdateEmailStatus {
            opened: Some(true),
            ..Default::default()
        }
        .apply(&mut row, later);
        assert_eq!(row.opened_at, Some(now));
        assert_eq!(row.updated_at, later);
    }

    #[test]
    fn test_stats_from_statuses() {
        let now = Utc::now();
        let mut sent = status(now);
        sent.sent = true;
        let mut bounced = status(now);
        bounced.sent = true;
        bounced.failed = true;
        let mut failed = status(now);
        failed.failed = true;

        let stats = CampaignStats::from_statuses(5, &[sent, bounced, failed]);
        assert_eq!(
            stats,
            CampaignStats {
                total: 5,
                sent: 2,
                success: 1,
                failed: 2
            }
        );
    }
}
