//! Storage abstraction shared by the in-memory and PostgreSQL backends

use crate::db::DatabasePool;
use crate::memory::MemStorage;
use crate::models::{
    Campaign, CampaignStats, EmailStatus, NewCampaign, NewEmailStatus, NewUser, UpdateCampaign,
    UpdateEmailStatus, User,
};
use crate::postgres::PgStorage;
use async_trait::async_trait;
use mailchats_common::types::{CampaignId, EmailStatusId, UserId};
use mailchats_common::{Config, Error, Result};
use std::sync::Arc;
use tracing::info;

/// Persistence operations used by the API and the campaign engine
#[async_trait]
pub trait Storage: Send + Sync {
    // Users
    async fn get_user(&self, id: UserId) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    /// Fails with `Error::Conflict` when the username is taken
    async fn create_user(&self, input: NewUser) -> Result<User>;

    // Campaigns
    async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign>;
    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>>;
    async fn update_campaign(
        &self,
        id: CampaignId,
        update: UpdateCampaign,
    ) -> Result<Option<Campaign>>;
    /// Newest first
    async fn list_campaigns(&self) -> Result<Vec<Campaign>>;
    /// Removes the campaign and its email statuses, returning the deleted row
    async fn delete_campaign(&self, id: CampaignId) -> Result<Option<Campaign>>;

    // Email statuses
    async fn create_email_status(&self, input: NewEmailStatus) -> Result<EmailStatus>;
    async fn get_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>>;
    async fn list_email_statuses(&self, campaign_id: CampaignId) -> Result<Vec<EmailStatus>>;
    async fn update_email_status(
        &self,
        id: EmailStatusId,
        update: UpdateEmailStatus,
    ) -> Result<Option<EmailStatus>>;
    async fn delete_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>>;

    /// Counts for a campaign; all zeros when the campaign does not exist
    async fn get_campaign_stats(&self, campaign_id: CampaignId) -> Result<CampaignStats> {
        let Some(campaign) = self.get_campaign(campaign_id).await? else {
            return Ok(CampaignStats::default());
        };
        let statuses = self.list_email_statuses(campaign_id).await?;
        Ok(CampaignStats::from_statuses(
            campaign.recipient_count,
            &statuses,
        ))
    }

    /// Check backend health
    async fn health_check(&self) -> Result<()>;
}

/// Build the storage backend selected in the configuration
pub async fn create_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    match config.storage.backend.as_str() {
        "memory" => {
            info!("Using in-memory storage");
            Ok(Arc::new(MemStorage::new()))
        }
        "postgres" => {
            let pool = DatabasePool::new(&config.database).await?;
            pool.migrate().await?;
            info!("Using PostgreSQL storage");
            Ok(Arc::new(PgStorage::new(pool)))
        }
        other => Err(Error::Config(format!(
            "Unsupported storage backend: {}",
            other
        ))),
    }
}
