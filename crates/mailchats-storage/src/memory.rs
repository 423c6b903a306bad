//! In-memory storage backend

use crate::models::{
    Campaign, EmailStatus, NewCampaign, NewEmailStatus, NewUser, UpdateCampaign,
    UpdateEmailStatus, User,
};
use crate::store::Storage;
use async_trait::async_trait;
use chrono::Utc;
use mailchats_common::types::{CampaignId, EmailStatusId, UserId};
use mailchats_common::{Error, Result};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    campaigns: Vec<Campaign>,
    email_statuses: Vec<EmailStatus>,
    next_user_id: UserId,
    next_campaign_id: CampaignId,
    next_email_status_id: EmailStatusId,
}

impl Tables {
    fn next_id(counter: &mut i32) -> i32 {
        *counter += 1;
        *counter
    }
}

/// Process-local storage; contents are lost on restart
#[derive(Default)]
pub struct MemStorage {
    tables: RwLock<Tables>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, input: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == input.username) {
            return Err(Error::Conflict("Username already exists".to_string()));
        }

        let now = Utc::now();
        let user = User {
            id: Tables::next_id(&mut tables.next_user_id),
            username: input.username,
            password: input.password,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        debug!(user_id = user.id, "User created");
        Ok(user)
    }

    async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let campaign = Campaign {
            id: Tables::next_id(&mut tables.next_campaign_id),
            name: input.name,
            from_name: input.from_name,
            send_method: input.send_method,
            api_key: input.api_key,
            smtp_mode: input.smtp_mode,
            smtp_host: input.smtp_host,
            smtp_port: input.smtp_port,
            smtp_username: input.smtp_username,
            smtp_password: input.smtp_password,
            rotate_smtp: input.rotate_smtp,
            send_speed: input.send_speed,
            track_opens: input.track_opens,
            track_links: input.track_links,
            track_replies: input.track_replies,
            recipient_count: input.recipient_count,
            status: input.status.unwrap_or_else(|| "processing".to_string()),
            started_at: now,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.campaigns.push(campaign.clone());
        debug!(campaign_id = campaign.id, "Campaign created");
        Ok(campaign)
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        let tables = self.tables.read().await;
        Ok(tables.campaigns.iter().find(|c| c.id == id).cloned())
    }

    async fn update_campaign(
        &self,
        id: CampaignId,
        update: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        let mut tables = self.tables.write().await;
        let Some(campaign) = tables.campaigns.iter_mut().find(|c| c.id == id) else {
            return Ok(None);
        };
        update.apply(campaign, Utc::now());
        Ok(Some(campaign.clone()))
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        let tables = self.tables.read().await;
        let mut campaigns = tables.campaigns.clone();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(campaigns)
    }

    async fn delete_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.campaigns.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        let campaign = tables.campaigns.remove(index);
        tables.email_statuses.retain(|s| s.campaign_id != id);
        Ok(Some(campaign))
    }

    async fn create_email_status(&self, input: NewEmailStatus) -> Result<EmailStatus> {
        let mut tables = self.tables.write().await;
        if !tables.campaigns.iter().any(|c| c.id == input.campaign_id) {
            return Err(Error::NotFound("Campaign not found".to_string()));
        }

        let now = Utc::now();
        let status = EmailStatus {
            id: Tables::next_id(&mut tables.next_email_status_id),
            campaign_id: input.campaign_id,
            email: input.email,
            subject: input.subject,
            sent: input.sent,
            delivered: false,
            opened: false,
            clicked: false,
            replied: false,
            failed: input.failed,
            failure_reason: input.failure_reason,
            sent_at: input.sent.then_some(now),
            opened_at: None,
            clicked_at: None,
            replied_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.email_statuses.push(status.clone());
        Ok(status)
    }

    async fn get_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        let tables = self.tables.read().await;
        Ok(tables.email_statuses.iter().find(|s| s.id == id).cloned())
    }

    async fn list_email_statuses(&self, campaign_id: CampaignId) -> Result<Vec<EmailStatus>> {
        let tables = self.tables.read().await;
        Ok(tables
            .email_statuses
            .iter()
            .filter(|s| s.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn update_email_status(
        &self,
        id: EmailStatusId,
        update: UpdateEmailStatus,
    ) -> Result<Option<EmailStatus>> {
        let mut tables = self.tables.write().await;
        let Some(status) = tables.email_statuses.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        update.apply(status, Utc::now());
        Ok(Some(status.clone()))
    }

    async fn delete_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.email_statuses.iter().position(|s| s.id == id) else {
            return Ok(None);
        };
        Ok(Some(tables.email_statuses.remove(index)))
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
