//! PostgreSQL storage backend

use crate::db::DatabasePool;
use crate::models::{
    Campaign, CampaignStats, EmailStatus, NewCampaign, NewEmailStatus, NewUser, UpdateCampaign,
    UpdateEmailStatus, User,
};
use crate::repository::{
    CampaignRepository, CampaignRepositoryTrait, EmailStatusRepository,
    EmailStatusRepositoryTrait, UserRepository, UserRepositoryTrait,
};
use crate::store::Storage;
use async_trait::async_trait;
use mailchats_common::types::{CampaignId, EmailStatusId, UserId};
use mailchats_common::{Error, Result};

/// Storage backed by the `users`, `email_campaigns` and `email_statuses` tables
pub struct PgStorage {
    pool: DatabasePool,
    users: UserRepository,
    campaigns: CampaignRepository,
    email_statuses: EmailStatusRepository,
}

impl PgStorage {
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            campaigns: CampaignRepository::new(pool.clone()),
            email_statuses: EmailStatusRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.users.get(id).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.users.get_by_username(username).await
    }

    async fn create_user(&self, input: NewUser) -> Result<User> {
        self.users.create(input).await
    }

    async fn create_campaign(&self, input: NewCampaign) -> Result<Campaign> {
        self.campaigns.create(input).await
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        self.campaigns.get(id).await
    }

    async fn update_campaign(
        &self,
        id: CampaignId,
        update: UpdateCampaign,
    ) -> Result<Option<Campaign>> {
        self.campaigns.update(id, update).await
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>> {
        self.campaigns.list().await
    }

    async fn delete_campaign(&self, id: CampaignId) -> Result<Option<Campaign>> {
        self.campaigns.delete(id).await
    }

    async fn create_email_status(&self, input: NewEmailStatus) -> Result<EmailStatus> {
        self.email_statuses.create(input).await
    }

    async fn get_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        self.email_statuses.get(id).await
    }

    async fn list_email_statuses(&self, campaign_id: CampaignId) -> Result<Vec<EmailStatus>> {
        self.email_statuses.list_by_campaign(campaign_id).await
    }

    async fn update_email_status(
        &self,
        id: EmailStatusId,
        update: UpdateEmailStatus,
    ) -> Result<Option<EmailStatus>> {
        self.email_statuses.update(id, update).await
    }

    async fn delete_email_status(&self, id: EmailStatusId) -> Result<Option<EmailStatus>> {
        self.email_statuses.delete(id).await
    }

    async fn get_campaign_stats(&self, campaign_id: CampaignId) -> Result<CampaignStats> {
        let row: Option<(i32, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT
                c.recipient_count,
                COUNT(s.id) FILTER (WHERE s.sent),
                COUNT(s.id) FILTER (WHERE s.sent AND NOT s.failed),
                COUNT(s.id) FILTER (WHERE s.failed)
            FROM email_campaigns c
            LEFT JOIN email_statuses s ON s.campaign_id = c.id
            WHERE c.id = $1
            GROUP BY c.id
            "#,
        )
        .bind(campaign_id)
        .fetch_optional(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(row
            .map(|(total, sent, success, failed)| CampaignStats {
                total: i64::from(total),
                sent,
                success,
                failed,
            })
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<()> {
        self.pool.health_check().await
    }
}
